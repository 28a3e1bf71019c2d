//! The config tree data model.
//!
//! A [`ConfigTree`] is what the `config` section of a config file
//! deserializes into: scalars, sequences and insertion-ordered mappings.
//!
//! Two conventions are layered on top of plain YAML/JSON:
//!
//! - **Stage-override mappings**: a mapping whose keys all start with `+`.
//!   Each `+<selector>` key names a stage (or a `/pattern/` of stages) and its
//!   value is what the parent key resolves to for that stage. Mixing `+` keys
//!   with ordinary keys in one mapping is rejected.
//! - **Tags** on string scalars: `:encrypt:<plaintext>` (open form, still to
//!   be encrypted) and `:decrypt:<base64>` (closed form ciphertext).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stagecrypt_core::{Error, Result, TreePath, DECRYPT_TAG, ENCRYPT_TAG, STAGE_MARKER};
use std::fmt;

/// A leaf value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// Tag carried by a string scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag<'a> {
    /// `:encrypt:` plaintext that must be stored as ciphertext
    Encrypt(&'a str),
    /// `:decrypt:` base64 ciphertext
    Decrypt(&'a str),
}

impl Scalar {
    /// The tag of a string scalar, if it carries one
    #[must_use]
    pub fn tag(&self) -> Option<Tag<'_>> {
        let Scalar::String(value) = self else {
            return None;
        };
        if let Some(plaintext) = value.strip_prefix(ENCRYPT_TAG) {
            Some(Tag::Encrypt(plaintext))
        } else {
            value.strip_prefix(DECRYPT_TAG).map(Tag::Decrypt)
        }
    }

    /// Plaintext tagged for encryption (open form)
    #[must_use]
    pub fn encrypt_tagged(plaintext: &str) -> Self {
        Scalar::String(format!("{ENCRYPT_TAG}{plaintext}"))
    }

    /// Ciphertext tagged for decryption (closed form)
    #[must_use]
    pub fn decrypt_tagged(ciphertext: &str) -> Self {
        Scalar::String(format!("{DECRYPT_TAG}{ciphertext}"))
    }

    /// Text form used when a scalar has to become a string (parameter values,
    /// per-leaf encryption). `None` for null.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(value) => Some(value.to_string()),
            Scalar::Number(value) => Some(value.to_string()),
            Scalar::String(value) => Some(value.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Number(value) => write!(f, "{value}"),
            Scalar::String(value) => write!(f, "{value}"),
        }
    }
}

/// A nested, per-stage-overridable configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigTree {
    Scalar(Scalar),
    Sequence(Vec<ConfigTree>),
    Mapping(IndexMap<String, ConfigTree>),
}

/// How the keys of a mapping are to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Ordinary keys, each a child of the parent path
    Plain,
    /// Every key is `+<selector>`
    StageOverride,
}

impl ConfigTree {
    /// An empty mapping
    #[must_use]
    pub fn empty_mapping() -> Self {
        ConfigTree::Mapping(IndexMap::new())
    }

    /// A plain string leaf
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        ConfigTree::Scalar(Scalar::String(value.into()))
    }

    /// Classify a mapping, rejecting a mix of stage and non-stage keys
    pub fn mapping_kind(map: &IndexMap<String, ConfigTree>, path: &TreePath) -> Result<MappingKind> {
        let staged = map.keys().filter(|key| key.starts_with(STAGE_MARKER)).count();
        if staged == 0 {
            Ok(MappingKind::Plain)
        } else if staged == map.len() {
            Ok(MappingKind::StageOverride)
        } else {
            let keys = map.keys().cloned().collect::<Vec<_>>().join(", ");
            Err(Error::malformed(
                path,
                format!("keys \"{keys}\" have a mix of stage and non-stage variables"),
            ))
        }
    }

    /// Count string leaves carrying the given kind of tag, override branches
    /// included.
    #[must_use]
    pub fn count_tagged(&self, encrypt: bool) -> usize {
        match self {
            ConfigTree::Scalar(scalar) => match scalar.tag() {
                Some(Tag::Encrypt(_)) if encrypt => 1,
                Some(Tag::Decrypt(_)) if !encrypt => 1,
                _ => 0,
            },
            ConfigTree::Sequence(items) => items.iter().map(|item| item.count_tagged(encrypt)).sum(),
            ConfigTree::Mapping(map) => map.values().map(|value| value.count_tagged(encrypt)).sum(),
        }
    }
}

impl ConfigTree {
    /// Build a tree from a loaded YAML value.
    ///
    /// Scalar mapping keys are kept as their text (`200: ok` has the key
    /// `"200"`), and YAML tags are dropped. Merge keys must already have been
    /// applied.
    pub fn from_yaml(value: serde_yaml::Value, path: &TreePath) -> Result<Self> {
        use serde_yaml::Value;

        match value {
            Value::Null => Ok(ConfigTree::Scalar(Scalar::Null)),
            Value::Bool(value) => Ok(ConfigTree::Scalar(Scalar::Bool(value))),
            Value::Number(number) => yaml_number(&number, path).map(ConfigTree::Scalar),
            Value::String(value) => Ok(ConfigTree::string(value)),
            Value::Sequence(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| Self::from_yaml(item, &path.index(index)))
                .collect::<Result<Vec<_>>>()
                .map(ConfigTree::Sequence),
            Value::Mapping(mapping) => {
                let mut map = IndexMap::with_capacity(mapping.len());
                for (key, value) in mapping {
                    let key = yaml_key(&key, path)?;
                    let child = path.key(&key);
                    if map.contains_key(&key) {
                        return Err(Error::malformed(&child, "duplicate mapping key"));
                    }
                    let value = Self::from_yaml(value, &child)?;
                    map.insert(key, value);
                }
                Ok(ConfigTree::Mapping(map))
            }
            Value::Tagged(tagged) => Self::from_yaml(tagged.value, path),
        }
    }
}

fn yaml_number(number: &serde_yaml::Number, path: &TreePath) -> Result<Scalar> {
    let converted = if let Some(value) = number.as_u64() {
        Some(serde_json::Number::from(value))
    } else if let Some(value) = number.as_i64() {
        Some(serde_json::Number::from(value))
    } else {
        number.as_f64().and_then(serde_json::Number::from_f64)
    };
    converted
        .map(Scalar::Number)
        .ok_or_else(|| Error::malformed(path, format!("number {number} cannot be represented")))
}

fn yaml_key(key: &serde_yaml::Value, path: &TreePath) -> Result<String> {
    use serde_yaml::Value;

    match key {
        Value::String(key) => Ok(key.clone()),
        Value::Number(key) => Ok(key.to_string()),
        Value::Bool(key) => Ok(key.to_string()),
        Value::Tagged(tagged) => yaml_key(&tagged.value, path),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => Err(Error::malformed(
            path,
            "mapping keys must be strings, numbers or booleans",
        )),
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::empty_mapping()
    }
}

impl From<Scalar> for ConfigTree {
    fn from(scalar: Scalar) -> Self {
        ConfigTree::Scalar(scalar)
    }
}

/// Strip the stage marker from an override key
#[must_use]
pub fn selector_of(key: &str) -> &str {
    key.strip_prefix(STAGE_MARKER).unwrap_or(key)
}
