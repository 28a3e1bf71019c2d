//! The on-disk config document: a `stages` section and a `config` section.

use crate::stages::{StageRegistry, StageTable};
use crate::tree::{ConfigTree, Scalar};
use serde::{Deserialize, Deserializer, Serialize};
use stagecrypt_core::{Error, Result, TreePath};
use std::fs;
use std::path::Path;

/// Serialization format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// JSON when the first non-blank character opens an object, YAML otherwise
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            DocumentFormat::Json
        } else {
            DocumentFormat::Yaml
        }
    }
}

/// A whole config file, open or closed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub stages: StageTable,

    #[serde(default)]
    pub config: ConfigTree,
}

impl ConfigDocument {
    /// Parse a document, detecting its format
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_as(text, DocumentFormat::detect(text))
    }

    /// Parse a document in a known format
    pub fn parse_as(text: &str, format: DocumentFormat) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: Self = match format {
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Yaml => {
                let mut value: serde_yaml::Value = serde_yaml::from_str(text)?;
                value.apply_merge()?;
                Self::from_yaml(value)?
            }
        };
        document.normalized()
    }

    /// Read a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::file_system(path, "read", e))?;
        tracing::debug!(path = %path.display(), "Loaded config document");
        Self::parse(&text)
    }

    /// Serialize in the given format
    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            DocumentFormat::Json => {
                let mut text = serde_json::to_string_pretty(self)?;
                text.push('\n');
                Ok(text)
            }
        }
    }

    /// Compile the stage definitions
    pub fn registry(&self) -> Result<StageRegistry> {
        StageRegistry::new(&self.stages)
    }

    // Sections are converted by hand so that scalar keys are accepted and
    // errors carry the tree path.
    fn from_yaml(value: serde_yaml::Value) -> Result<Self> {
        let mut sections = match value {
            serde_yaml::Value::Null => return Ok(Self::default()),
            serde_yaml::Value::Mapping(sections) => sections,
            _ => {
                return Err(Error::malformed(
                    &TreePath::root(),
                    "a config document must be a mapping with stages and config sections",
                ))
            }
        };

        let stages = match sections.remove("stages") {
            None | Some(serde_yaml::Value::Null) => StageTable::default(),
            Some(stages) => serde_yaml::from_value(stages)?,
        };
        let config = match sections.remove("config") {
            None => ConfigTree::default(),
            Some(config) => ConfigTree::from_yaml(config, &TreePath::root())?,
        };
        Ok(Self { stages, config })
    }

    // A null `config` section is an empty one; anything else must be a mapping.
    fn normalized(mut self) -> Result<Self> {
        match self.config {
            ConfigTree::Mapping(_) => Ok(self),
            ConfigTree::Scalar(Scalar::Null) => {
                self.config = ConfigTree::empty_mapping();
                Ok(self)
            }
            _ => Err(Error::malformed(
                &TreePath::root(),
                "the config section must be a mapping",
            )),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
