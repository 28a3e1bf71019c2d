//! Stage-aware encryption front end.
//!
//! The gateway turns "encrypt this for stage X" into "encrypt with key K in
//! environment E": the stage registry supplies both, the provider builds a
//! key service client for E, and the client is cached for the rest of the
//! command. Ciphertext crosses this boundary as standard base64.

use crate::chunking::split_utf8;
use crate::service::{KeyService, KeyServiceProvider};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use stagecrypt_config::{KeyRef, StageRegistry};
use stagecrypt_core::{Error, Result, TreePath, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
use std::collections::HashMap;
use std::sync::Arc;

pub struct CryptoGateway<'a> {
    registry: &'a StageRegistry,
    provider: &'a dyn KeyServiceProvider,
    clients: Mutex<HashMap<String, Arc<dyn KeyService>>>,
    chunk_size: usize,
}

impl<'a> CryptoGateway<'a> {
    #[must_use]
    pub fn new(registry: &'a StageRegistry, provider: &'a dyn KeyServiceProvider) -> Self {
        Self {
            registry,
            provider,
            clients: Mutex::new(HashMap::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the chunk size used by the chunked operations
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        if chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::configuration(format!(
                "chunk size must be at least {MIN_CHUNK_SIZE} bytes, got {chunk_size}"
            )));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    #[must_use]
    pub fn registry(&self) -> &'a StageRegistry {
        self.registry
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The key service client for a stage's environment
    pub fn key_service(&self, stage: &str) -> Result<Arc<dyn KeyService>> {
        let environment = self.registry.environment(stage)?;

        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(environment) {
            return Ok(Arc::clone(client));
        }

        tracing::debug!(stage = %stage, environment = %environment, "Creating key service client");
        let client = self.provider.key_service(environment)?;
        clients.insert(environment.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Encrypt text with the stage's key, returning base64 ciphertext
    pub fn encrypt_text(&self, plaintext: &str, stage: &str) -> Result<String> {
        let key = self.registry.key_ref(stage)?;
        let ciphertext = self.encrypt_bytes(plaintext.as_bytes(), &key, stage)?;
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt base64 ciphertext in the stage's environment
    pub fn decrypt_text(&self, ciphertext: &str, stage: &str) -> Result<String> {
        let plaintext = self.decrypt_bytes(ciphertext, stage)?;
        into_text(plaintext)
    }

    /// Encrypt arbitrarily large text as an ordered list of base64 chunks
    pub fn encrypt_chunked(&self, plaintext: &str, stage: &str) -> Result<Vec<String>> {
        let chunks = split_utf8(plaintext, self.chunk_size);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let key = self.registry.key_ref(stage)?;
        tracing::debug!(
            stage = %stage,
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            "Encrypting in chunks"
        );

        chunks
            .into_iter()
            .map(|chunk| {
                self.encrypt_bytes(chunk.as_bytes(), &key, stage)
                    .map(|ciphertext| STANDARD.encode(ciphertext))
            })
            .collect()
    }

    /// Decrypt a chunk list and join the plaintext in order
    pub fn decrypt_chunked(&self, chunks: &[String], stage: &str) -> Result<String> {
        let mut plaintext = Vec::new();
        for chunk in chunks {
            plaintext.extend(self.decrypt_bytes(chunk, stage)?);
        }
        into_text(plaintext)
    }

    /// Resolve a raw key reference to a concrete key id in the stage's
    /// environment
    pub fn describe_key(&self, raw: &str, stage: &str) -> Result<String> {
        let key = KeyRef::parse(raw)?;
        self.key_service(stage)?.describe_key(&key)
    }

    fn encrypt_bytes(&self, plaintext: &[u8], key: &KeyRef, stage: &str) -> Result<Vec<u8>> {
        self.key_service(stage)?.encrypt(plaintext, key)
    }

    fn decrypt_bytes(&self, ciphertext: &str, stage: &str) -> Result<Vec<u8>> {
        let blob = STANDARD.decode(ciphertext.trim()).map_err(|e| {
            Error::malformed(
                &TreePath::root(),
                format!("ciphertext is not valid base64: {e}"),
            )
        })?;
        self.key_service(stage)?.decrypt(&blob)
    }
}

fn into_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|_| Error::key_service("decrypt", "decrypted value is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LocalKeyService, LocalProvider};
    use proptest::prelude::*;
    use stagecrypt_config::StageTable;

    fn registry() -> StageRegistry {
        let table: StageTable = serde_yaml::from_str(
            "prod:\n  environment: prod\n  key: prod-key\n/.*/:\n  environment: dev\n  key: dev-key\n",
        )
        .unwrap();
        StageRegistry::new(&table).unwrap()
    }

    #[test]
    fn test_text_roundtrip_uses_stage_key() {
        let registry = registry();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);

        let ciphertext = gateway.encrypt_text("s3cret", "prod").unwrap();
        assert_ne!(ciphertext, "s3cret");
        let blob = STANDARD.decode(&ciphertext).unwrap();
        assert_eq!(
            LocalKeyService::key_of(&blob).as_deref(),
            Some("alias/prod-key")
        );
        assert_eq!(gateway.decrypt_text(&ciphertext, "prod").unwrap(), "s3cret");
    }

    #[test]
    fn test_one_client_per_environment() {
        let registry = registry();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);

        gateway.encrypt_text("a", "prod").unwrap();
        gateway.encrypt_text("b", "prod").unwrap();
        gateway.encrypt_text("c", "staging").unwrap();
        gateway.encrypt_text("d", "qa").unwrap();

        assert_eq!(provider.requested_environments(), ["prod", "dev"]);
        assert_eq!(provider.key_service.encrypt_calls(), 4);
    }

    #[test]
    fn test_unknown_stage_is_reported() {
        let table: StageTable =
            serde_yaml::from_str("prod:\n  environment: prod\n  key: k\n").unwrap();
        let registry = StageRegistry::new(&table).unwrap();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);

        let err = gateway.encrypt_text("x", "dev").unwrap_err();
        assert!(matches!(err, Error::UnknownStage { .. }));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let registry = registry();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);

        let err = gateway.decrypt_text("not base64!", "prod").unwrap_err();
        assert!(matches!(err, Error::MalformedTree { .. }));
    }

    #[test]
    fn test_service_failure_propagates() {
        let registry = registry();
        let provider = LocalProvider::new();
        provider.key_service.fail_decrypt("access denied");
        let gateway = CryptoGateway::new(&registry, &provider);

        let ciphertext = gateway.encrypt_text("x", "prod").unwrap();
        let err = gateway.decrypt_text(&ciphertext, "prod").unwrap_err();
        assert!(matches!(err, Error::KeyService { .. }));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_chunk_size_floor() {
        let registry = registry();
        let provider = LocalProvider::new();
        assert!(CryptoGateway::new(&registry, &provider)
            .with_chunk_size(3)
            .is_err());
    }

    #[test]
    fn test_large_secret_in_chunks() {
        let registry = registry();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider)
            .with_chunk_size(3 * 1024)
            .unwrap();

        let secret: String = (0..10 * 1024)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let chunks = gateway.encrypt_chunked(&secret, "prod").unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(gateway.decrypt_chunked(&chunks, "prod").unwrap(), secret);
    }

    #[test]
    fn test_chunks_respect_service_limit() {
        let registry = registry();
        let provider = LocalProvider::new();
        provider.key_service.set_max_plaintext(16);
        let gateway = CryptoGateway::new(&registry, &provider);

        assert!(gateway.encrypt_text(&"x".repeat(17), "prod").is_err());

        let gateway = gateway.with_chunk_size(16).unwrap();
        let chunks = gateway.encrypt_chunked(&"x".repeat(40), "prod").unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let registry = registry();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);
        assert!(gateway.encrypt_chunked("", "prod").unwrap().is_empty());
        assert_eq!(gateway.decrypt_chunked(&[], "prod").unwrap(), "");
        assert_eq!(provider.key_service.encrypt_calls(), 0);
    }

    #[test]
    fn test_describe_key_normalizes_first() {
        let registry = registry();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);
        assert_eq!(
            gateway.describe_key("ssm-key", "prod").unwrap(),
            LocalKeyService::key_id_for("alias/ssm-key")
        );
    }

    proptest! {
        #[test]
        fn prop_chunked_roundtrip(text in "\\PC{0,200}", size in 4usize..40) {
            let registry = registry();
            let provider = LocalProvider::new();
            let gateway = CryptoGateway::new(&registry, &provider)
                .with_chunk_size(size)
                .unwrap();
            let chunks = gateway.encrypt_chunked(&text, "prod").unwrap();
            prop_assert_eq!(gateway.decrypt_chunked(&chunks, "prod").unwrap(), text);
        }
    }
}
