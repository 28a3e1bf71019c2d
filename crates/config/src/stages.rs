//! Stage definitions and stage-name matching.
//!
//! Stages are declared in the `stages` section of the config file, either as
//! a mapping (`prod: {environment: prod, key: prod-key}`) or as a list of
//! records with a `name` field. A name is a literal (`prod`) or a regular
//! expression between slashes (`/dev-.*/`) that must match the whole stage
//! name.
//!
//! # Matching
//!
//! 1. Literal names are compared for exact equality first.
//! 2. Only when no literal matches are patterns tried, in definition order.
//!    The first matching pattern wins. Overlapping patterns are legal but a
//!    warning lists every pattern that matched.
//!
//! The same rule picks a branch out of a stage-override mapping, see
//! [`select_branch`].

use crate::keys::KeyRef;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use stagecrypt_core::{Error, Result};

/// Per-stage settings in the mapping form of the `stages` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(
        default,
        alias = "keyRef",
        alias = "key_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<String>,
}

/// A named stage: literal or `/pattern/` name, environment and key reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(
        default,
        alias = "keyRef",
        alias = "key_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<String>,
}

/// The `stages` section as written in the file.
///
/// The shape that was read is kept so that a rewrite produces the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageTable {
    Map(IndexMap<String, StageSpec>),
    List(Vec<StageDefinition>),
}

impl Default for StageTable {
    fn default() -> Self {
        StageTable::Map(IndexMap::new())
    }
}

impl StageTable {
    /// Definitions in file order
    #[must_use]
    pub fn definitions(&self) -> Vec<StageDefinition> {
        match self {
            StageTable::Map(map) => map
                .iter()
                .map(|(name, spec)| StageDefinition {
                    name: name.clone(),
                    environment: spec.environment.clone(),
                    key: spec.key.clone(),
                })
                .collect(),
            StageTable::List(list) => list.clone(),
        }
    }
}

/// A compiled stage name or override selector
#[derive(Debug, Clone)]
pub enum Selector {
    Literal(String),
    Pattern { source: String, regex: Regex },
}

impl Selector {
    /// Parse a name; `/…/` becomes a whole-string regular expression
    pub fn parse(name: &str) -> Result<Self> {
        match name
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(pattern) if name.len() >= 2 => {
                let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    Error::configuration(format!("invalid stage pattern '{name}': {e}"))
                })?;
                Ok(Selector::Pattern {
                    source: name.to_string(),
                    regex,
                })
            }
            _ => Ok(Selector::Literal(name.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Selector::Literal(name) => name,
            Selector::Pattern { source, .. } => source,
        }
    }

    #[must_use]
    pub fn is_pattern(&self) -> bool {
        matches!(self, Selector::Pattern { .. })
    }
}

/// Pick the selector that applies to `stage`, returning its position.
///
/// Literal selectors win over patterns; among patterns the first in order
/// wins.
pub fn select_branch<'a, I>(selectors: I, stage: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a Selector>,
{
    let selectors: Vec<&Selector> = selectors.into_iter().collect();

    if let Some(index) = selectors
        .iter()
        .position(|selector| matches!(selector, Selector::Literal(name) if name == stage))
    {
        return Some(index);
    }

    let matching: Vec<usize> = selectors
        .iter()
        .enumerate()
        .filter_map(|(index, selector)| match selector {
            Selector::Pattern { regex, .. } if regex.is_match(stage) => Some(index),
            _ => None,
        })
        .collect();

    if matching.len() > 1 {
        let patterns = matching
            .iter()
            .map(|index| selectors[*index].as_str())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!(
            stage = %stage,
            patterns = %patterns,
            "Several stage patterns match; using the first one"
        );
    }

    matching.first().copied()
}

/// Parsed stage definitions for one invocation
#[derive(Debug, Clone)]
pub struct StageRegistry {
    selectors: Vec<Selector>,
    definitions: Vec<StageDefinition>,
}

impl StageRegistry {
    /// Build a registry, compiling patterns and rejecting duplicate names
    pub fn new(table: &StageTable) -> Result<Self> {
        let definitions = table.definitions();
        let mut selectors = Vec::with_capacity(definitions.len());

        for (index, definition) in definitions.iter().enumerate() {
            if definitions[..index]
                .iter()
                .any(|earlier| earlier.name == definition.name)
            {
                return Err(Error::configuration(format!(
                    "stage '{}' is defined more than once",
                    definition.name
                )));
            }
            selectors.push(Selector::parse(&definition.name)?);
        }

        tracing::debug!(stages = definitions.len(), "Stage registry loaded");

        Ok(Self {
            selectors,
            definitions,
        })
    }

    /// Find the definition for a stage name.
    ///
    /// A name equal to a definition's own name (pattern definitions included)
    /// selects that definition, which is how a `+/pattern/` override branch
    /// finds the key of the pattern stage it was written for.
    pub fn resolve(&self, stage: &str) -> Result<&StageDefinition> {
        if let Some(definition) = self.definitions.iter().find(|d| d.name == stage) {
            return Ok(definition);
        }
        select_branch(&self.selectors, stage)
            .map(|index| &self.definitions[index])
            .ok_or_else(|| Error::unknown_stage(stage))
    }

    /// The environment a stage's key service lives in
    pub fn environment(&self, stage: &str) -> Result<&str> {
        let definition = self.resolve(stage)?;
        match definition.environment.as_deref() {
            Some(environment) if !environment.trim().is_empty() => Ok(environment),
            _ => Err(Error::key_resolution(
                stage,
                format!("no environment defined for stage '{}'", definition.name),
            )),
        }
    }

    /// The normalized key used to encrypt values for a stage
    pub fn key_ref(&self, stage: &str) -> Result<KeyRef> {
        let definition = self.resolve(stage)?;
        let raw = definition.key.as_deref().ok_or_else(|| {
            Error::key_resolution(
                stage,
                format!("no key defined for stage '{}'", definition.name),
            )
        })?;
        KeyRef::parse(raw).map_err(|e| Error::key_resolution(stage, e.to_string()))
    }

    #[must_use]
    pub fn definitions(&self) -> &[StageDefinition] {
        &self.definitions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(yaml: &str) -> StageRegistry {
        let table: StageTable = serde_yaml::from_str(yaml).unwrap();
        StageRegistry::new(&table).unwrap()
    }

    const STAGES: &str = r"
/.*/:
  environment: dev
  key: dev-key
prod:
  environment: prod
  key: prod-key
";

    #[test]
    fn test_literal_beats_pattern() {
        let stages = registry(STAGES);
        assert_eq!(stages.resolve("prod").unwrap().environment.as_deref(), Some("prod"));
        assert_eq!(stages.resolve("staging").unwrap().name, "/.*/");
        assert_eq!(stages.key_ref("prod").unwrap().as_str(), "alias/prod-key");
        assert_eq!(stages.key_ref("qa").unwrap().as_str(), "alias/dev-key");
    }

    #[test]
    fn test_unknown_stage() {
        let stages = registry("prod:\n  environment: prod\n  key: k\n");
        let err = stages.resolve("dev").unwrap_err();
        assert!(matches!(err, Error::UnknownStage { ref name, .. } if name == "dev"));
    }

    #[test]
    fn test_patterns_match_whole_name() {
        let stages = registry("/ba.*/:\n  environment: dev\n  key: k\n");
        assert!(stages.resolve("baz").is_ok());
        assert!(stages.resolve("abaz").is_err());
    }

    #[test]
    fn test_first_pattern_in_definition_order_wins() {
        let stages = registry(
            "/dev-.*/:\n  environment: one\n  key: a\n/.*-eu/:\n  environment: two\n  key: b\n",
        );
        assert_eq!(stages.environment("dev-eu").unwrap(), "one");
        assert_eq!(stages.environment("prod-eu").unwrap(), "two");
    }

    #[test]
    fn test_pattern_definition_found_by_its_own_name() {
        let stages = registry(
            "/dev-.*/:\n  environment: dev\n  key: dev\n/.*/:\n  environment: other\n  key: o\n",
        );
        assert_eq!(stages.environment("/dev-.*/").unwrap(), "dev");
    }

    #[test]
    fn test_list_form() {
        let stages = registry(
            "- name: prod\n  environment: prod\n  keyRef: alias/prod\n- name: /.*/\n  environment: dev\n  key: dev\n",
        );
        assert_eq!(stages.key_ref("prod").unwrap().as_str(), "alias/prod");
        assert_eq!(stages.environment("other").unwrap(), "dev");
    }

    #[test]
    fn test_missing_key_is_key_resolution_error() {
        let stages = registry("prod:\n  environment: prod\n");
        let err = stages.key_ref("prod").unwrap_err();
        assert!(matches!(err, Error::KeyResolution { .. }));

        let stages = registry("prod:\n  key: k\n");
        assert!(matches!(
            stages.environment("prod").unwrap_err(),
            Error::KeyResolution { .. }
        ));
    }

    #[test]
    fn test_duplicates_and_bad_patterns_rejected() {
        let table: StageTable =
            serde_yaml::from_str("- name: prod\n  key: a\n- name: prod\n  key: b\n").unwrap();
        assert!(StageRegistry::new(&table).is_err());

        let table: StageTable = serde_yaml::from_str("/(/:\n  key: a\n").unwrap();
        assert!(matches!(
            StageRegistry::new(&table).unwrap_err(),
            Error::Configuration { .. }
        ));
    }

    #[test]
    fn test_select_branch_prefers_literal() {
        let selectors = vec![
            Selector::parse("/.*/").unwrap(),
            Selector::parse("prod").unwrap(),
        ];
        assert_eq!(select_branch(&selectors, "prod"), Some(1));
        assert_eq!(select_branch(&selectors, "staging"), Some(0));
        assert_eq!(select_branch(&[Selector::parse("prod").unwrap()], "dev"), None);
    }

    #[test]
    fn test_slash_alone_is_literal() {
        assert!(!Selector::parse("/").unwrap().is_pattern());
        assert!(Selector::parse("//").unwrap().is_pattern());
    }

    #[test]
    fn test_shape_survives_roundtrip() {
        let table: StageTable = serde_yaml::from_str(STAGES).unwrap();
        assert!(matches!(table, StageTable::Map(_)));
        let rendered = serde_yaml::to_string(&table).unwrap();
        let reparsed: StageTable = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, table);
    }
}
