//! Key reference normalization.
//!
//! Stage definitions name their key in whatever form is convenient:
//!
//! - a full ARN (`arn:aws:kms:…:key/…` or `arn:aws:kms:…:alias/…`)
//! - an alias with prefix (`alias/payments`)
//! - a raw key id (`1234abcd-12ab-34cd-56ef-1234567890ab`, `mrk-…`)
//! - a bare alias name (`payments`)
//!
//! All four normalize to a string the key service accepts. Bare names are the
//! only form that is rewritten: they gain the `alias/` prefix.

use stagecrypt_core::{Error, Result, ALIAS_PREFIX};
use std::fmt::{self, Display};

/// A normalized key reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyRef {
    Arn(String),
    Alias(String),
    KeyId(String),
}

impl KeyRef {
    /// Normalize a raw key reference
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::configuration("key reference cannot be empty"));
        }
        if raw.starts_with("arn:") {
            return Ok(KeyRef::Arn(raw.to_string()));
        }
        if let Some(name) = raw.strip_prefix(ALIAS_PREFIX) {
            if name.is_empty() {
                return Err(Error::configuration(format!(
                    "key reference '{raw}' has an empty alias name"
                )));
            }
            return Ok(KeyRef::Alias(raw.to_string()));
        }
        if is_key_id(raw) {
            return Ok(KeyRef::KeyId(raw.to_string()));
        }
        Ok(KeyRef::Alias(format!("{ALIAS_PREFIX}{raw}")))
    }

    /// The identifier passed to the key service
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            KeyRef::Arn(value) | KeyRef::Alias(value) | KeyRef::KeyId(value) => value,
        }
    }
}

impl Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Single-region keys are UUIDs, multi-region keys are `mrk-` + 32 hex digits.
fn is_key_id(raw: &str) -> bool {
    if uuid::Uuid::parse_str(raw).is_ok() && raw.len() == 36 {
        return true;
    }
    raw.strip_prefix("mrk-")
        .is_some_and(|rest| rest.len() == 32 && rest.chars().all(|c| c.is_ascii_hexdigit()))
}
