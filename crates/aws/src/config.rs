use stagecrypt_config::EnvironmentEntry;
use std::time::Duration;

/// Settings applied to every AWS client built for a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Region; falls back to the catalog entry, then the ambient AWS config
    pub region: Option<String>,
    /// Named credentials profile; falls back to the catalog entry
    pub profile: Option<String>,
    /// Endpoint override, e.g. a local KMS emulator
    pub endpoint_url: Option<String>,
    /// Upper bound on one SDK operation, retries included
    pub operation_timeout: Duration,
    pub connect_timeout: Duration,
    /// Total attempts per call; 1 disables retries
    pub max_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            endpoint_url: None,
            operation_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

impl ServiceConfig {
    /// Settings for one environment: explicit values win, unset ones are
    /// taken from the catalog entry.
    #[must_use]
    pub fn for_environment(&self, entry: Option<&EnvironmentEntry>) -> Self {
        let mut config = self.clone();
        if let Some(entry) = entry {
            if config.region.is_none() {
                config.region.clone_from(&entry.region);
            }
            if config.profile.is_none() {
                config.profile.clone_from(&entry.profile);
            }
        }
        config
    }
}
