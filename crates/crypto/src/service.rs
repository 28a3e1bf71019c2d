//! Traits at the edge of the process: key service and parameter store.

use stagecrypt_config::KeyRef;
use stagecrypt_core::Result;
use std::sync::Arc;

/// An external key-management service bound to one environment
pub trait KeyService: Send + Sync {
    /// Encrypt raw bytes under `key`
    fn encrypt(&self, plaintext: &[u8], key: &KeyRef) -> Result<Vec<u8>>;

    /// Decrypt a ciphertext blob; the blob identifies its own key
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Resolve a key reference to the concrete key id
    fn describe_key(&self, key: &KeyRef) -> Result<String> {
        Ok(key.as_str().to_string())
    }
}

/// Builds key service clients per environment
pub trait KeyServiceProvider: Send + Sync {
    fn key_service(&self, environment: &str) -> Result<Arc<dyn KeyService>>;
}

/// A remote hierarchical parameter store
pub trait ParameterStore: Send + Sync {
    /// Create or overwrite a secret-typed parameter
    fn put_secret(&self, name: &str, value: &str, key_id: Option<&str>) -> Result<()>;

    /// Account the store belongs to
    fn account_id(&self) -> Result<String>;
}

/// Builds parameter store clients per environment
pub trait ParameterStoreProvider: Send + Sync {
    fn parameter_store(&self, environment: &str) -> Result<Arc<dyn ParameterStore>>;
}
