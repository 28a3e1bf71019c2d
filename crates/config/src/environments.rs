//! The environment catalog (`environments.yml`).
//!
//! Each stage definition names an environment; the catalog maps that name to
//! the account it lives in and, optionally, the profile and region used to
//! build service clients for it.
//!
//! ```yaml
//! environments:
//!   - name: dev
//!     account: "123456789012"
//!     profile: dev-admin
//!   - name: prod
//!     account: 210987654321
//!     region: eu-west-1
//! ```

use crate::document::ConfigDocument;
use crate::stages::{StageSpec, StageTable};
use crate::tree::ConfigTree;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use stagecrypt_core::{Error, Result, KEY_PLACEHOLDER};
use std::fs;
use std::path::Path;

/// One environment of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    pub name: String,

    #[serde(default, deserialize_with = "account_id")]
    pub account: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Known environments, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCatalog {
    #[serde(default)]
    pub environments: Vec<EnvironmentEntry>,
}

// Account ids are frequently written unquoted and then parse as integers.
fn account_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => format!("{number:012}"),
    }))
}

impl EnvironmentCatalog {
    /// Parse a catalog from YAML text
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a catalog, treating a missing file as an empty catalog
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No environment catalog, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| Error::file_system(path, "read", e))?;
        Self::parse(&text)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Look up an environment.
    ///
    /// An empty catalog knows every environment (clients then use the
    /// ambient profile and region). A non-empty catalog must list it.
    pub fn lookup(&self, name: &str) -> Result<Option<&EnvironmentEntry>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.environments
            .iter()
            .find(|entry| entry.name == name)
            .map(Some)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "environment '{name}' is not known, add it to the environments file"
                ))
            })
    }

    /// Starting document for a project without a config file: one stage per
    /// environment, each with a placeholder key.
    #[must_use]
    pub fn template(&self) -> ConfigDocument {
        let stages: IndexMap<String, StageSpec> = self
            .environments
            .iter()
            .map(|entry| {
                (
                    entry.name.clone(),
                    StageSpec {
                        environment: Some(entry.name.clone()),
                        key: Some(KEY_PLACEHOLDER.to_string()),
                    },
                )
            })
            .collect();

        ConfigDocument {
            stages: StageTable::Map(stages),
            config: ConfigTree::empty_mapping(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentFormat;
    use tempfile::TempDir;

    const CATALOG: &str = r#"
environments:
  - name: dev
    account: "000123456789"
    profile: dev-admin
  - name: prod
    account: 210987654321
    region: eu-west-1
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = EnvironmentCatalog::parse(CATALOG).unwrap();
        let dev = catalog.lookup("dev").unwrap().unwrap();
        assert_eq!(dev.account.as_deref(), Some("000123456789"));
        assert_eq!(dev.profile.as_deref(), Some("dev-admin"));

        let prod = catalog.lookup("prod").unwrap().unwrap();
        assert_eq!(prod.account.as_deref(), Some("210987654321"));
        assert_eq!(prod.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_unknown_environment() {
        let catalog = EnvironmentCatalog::parse(CATALOG).unwrap();
        let err = catalog.lookup("qa").unwrap_err();
        assert!(err.to_string().contains("'qa' is not known"));
    }

    #[test]
    fn test_empty_catalog_accepts_anything() {
        let catalog = EnvironmentCatalog::default();
        assert!(catalog.lookup("anything").unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let catalog = EnvironmentCatalog::load(&dir.path().join("environments.yml")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_template_has_one_stage_per_environment() {
        let catalog = EnvironmentCatalog::parse(CATALOG).unwrap();
        let template = catalog.template();
        let text = template.render(DocumentFormat::Yaml).unwrap();
        assert!(text.contains("key: enter-key-name-here"));

        let registry = template.registry().unwrap();
        assert_eq!(registry.environment("prod").unwrap(), "prod");
        assert_eq!(
            registry.key_ref("dev").unwrap().as_str(),
            "alias/enter-key-name-here"
        );
        assert_eq!(template.config, ConfigTree::empty_mapping());
    }
}
