//! In-process doubles for the key service and parameter store.
//!
//! [`LocalKeyService`] is a reversible, deterministic stand-in for a real
//! key-management service. Its ciphertext is not secure; it records which
//! key produced it so tests can assert on key selection.

use crate::service::{KeyService, KeyServiceProvider, ParameterStore, ParameterStoreProvider};
use parking_lot::Mutex;
use stagecrypt_config::KeyRef;
use stagecrypt_core::{Error, Result, DEFAULT_CHUNK_SIZE};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const MAGIC: &[u8] = b"LKS1";

/// Deterministic local key service
#[derive(Debug)]
pub struct LocalKeyService {
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
    max_plaintext: AtomicUsize,
    encrypt_failure: Mutex<Option<String>>,
    decrypt_failure: Mutex<Option<String>>,
}

impl Default for LocalKeyService {
    fn default() -> Self {
        Self {
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            max_plaintext: AtomicUsize::new(DEFAULT_CHUNK_SIZE),
            encrypt_failure: Mutex::new(None),
            decrypt_failure: Mutex::new(None),
        }
    }
}

impl LocalKeyService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    /// Reject plaintexts longer than `limit` bytes
    pub fn set_max_plaintext(&self, limit: usize) {
        self.max_plaintext.store(limit, Ordering::SeqCst);
    }

    /// Make every following encrypt call fail
    pub fn fail_encrypt(&self, message: &str) {
        *self.encrypt_failure.lock() = Some(message.to_string());
    }

    /// Make every following decrypt call fail
    pub fn fail_decrypt(&self, message: &str) {
        *self.decrypt_failure.lock() = Some(message.to_string());
    }

    /// The key a ciphertext blob was produced with
    #[must_use]
    pub fn key_of(blob: &[u8]) -> Option<String> {
        let (key, _) = split_blob(blob)?;
        Some(key.to_string())
    }

    /// Key id reported by `describe_key` for a normalized reference
    #[must_use]
    pub fn key_id_for(key: &str) -> String {
        format!("local-key:{key}")
    }
}

fn mask(key: &[u8], data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, byte)| byte ^ key[i % key.len()] ^ (i as u8).wrapping_mul(31))
        .collect()
}

fn split_blob(blob: &[u8]) -> Option<(&str, &[u8])> {
    let rest = blob.strip_prefix(MAGIC)?;
    let (len, rest) = rest.split_first_chunk::<2>()?;
    let len = usize::from(u16::from_be_bytes(*len));
    if rest.len() < len {
        return None;
    }
    let (key, body) = rest.split_at(len);
    Some((std::str::from_utf8(key).ok()?, body))
}

impl KeyService for LocalKeyService {
    fn encrypt(&self, plaintext: &[u8], key: &KeyRef) -> Result<Vec<u8>> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.encrypt_failure.lock().clone() {
            return Err(Error::key_service("encrypt", message));
        }
        let limit = self.max_plaintext.load(Ordering::SeqCst);
        if plaintext.len() > limit {
            return Err(Error::key_service(
                "encrypt",
                format!("plaintext of {} bytes exceeds {limit} bytes", plaintext.len()),
            ));
        }

        let key = key.as_str().as_bytes();
        let len = u16::try_from(key.len())
            .map_err(|_| Error::key_service("encrypt", "key reference too long"))?;

        let mut blob = Vec::with_capacity(MAGIC.len() + 2 + key.len() + plaintext.len());
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&len.to_be_bytes());
        blob.extend_from_slice(key);
        blob.extend(mask(key, plaintext));
        Ok(blob)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.decrypt_failure.lock().clone() {
            return Err(Error::key_service("decrypt", message));
        }
        let (key, body) = split_blob(ciphertext)
            .ok_or_else(|| Error::key_service("decrypt", "invalid ciphertext"))?;
        Ok(mask(key.as_bytes(), body))
    }

    fn describe_key(&self, key: &KeyRef) -> Result<String> {
        Ok(Self::key_id_for(key.as_str()))
    }
}

/// A parameter write captured by [`RecordingParameterStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub name: String,
    pub value: String,
    pub key_id: Option<String>,
}

/// Parameter store that keeps writes in memory
#[derive(Debug, Default)]
pub struct RecordingParameterStore {
    writes: Mutex<Vec<RecordedWrite>>,
    failing: Mutex<Vec<String>>,
}

impl RecordingParameterStore {
    pub const ACCOUNT_ID: &'static str = "123456789012";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes to `name` fail
    pub fn fail_on(&self, name: &str) {
        self.failing.lock().push(name.to_string());
    }

    #[must_use]
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }
}

impl ParameterStore for RecordingParameterStore {
    fn put_secret(&self, name: &str, value: &str, key_id: Option<&str>) -> Result<()> {
        if self.failing.lock().iter().any(|failing| failing == name) {
            return Err(Error::parameter_store("put", "throttled"));
        }
        self.writes.lock().push(RecordedWrite {
            name: name.to_string(),
            value: value.to_string(),
            key_id: key_id.map(str::to_string),
        });
        Ok(())
    }

    fn account_id(&self) -> Result<String> {
        Ok(Self::ACCOUNT_ID.to_string())
    }
}

/// Provider handing out the same doubles for every environment
#[derive(Debug, Default)]
pub struct LocalProvider {
    pub key_service: Arc<LocalKeyService>,
    pub parameter_store: Arc<RecordingParameterStore>,
    requested: Mutex<Vec<String>>,
}

impl LocalProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Environments a client was requested for, in order
    #[must_use]
    pub fn requested_environments(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

impl KeyServiceProvider for LocalProvider {
    fn key_service(&self, environment: &str) -> Result<Arc<dyn KeyService>> {
        self.requested.lock().push(environment.to_string());
        Ok(self.key_service.clone())
    }
}

impl ParameterStoreProvider for LocalProvider {
    fn parameter_store(&self, environment: &str) -> Result<Arc<dyn ParameterStore>> {
        self.requested.lock().push(environment.to_string());
        Ok(self.parameter_store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_key_tagging() {
        let service = LocalKeyService::new();
        let key = KeyRef::parse("alias/one").unwrap();
        let blob = service.encrypt(b"hello", &key).unwrap();
        assert_ne!(&blob[blob.len() - 5..], b"hello");
        assert_eq!(LocalKeyService::key_of(&blob).as_deref(), Some("alias/one"));
        assert_eq!(service.decrypt(&blob).unwrap(), b"hello");
        assert_eq!((service.encrypt_calls(), service.decrypt_calls()), (1, 1));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let service = LocalKeyService::new();
        assert!(service.decrypt(b"nope").is_err());
    }

    #[test]
    fn test_recording_store() {
        let store = RecordingParameterStore::new();
        store.fail_on("/b");
        store.put_secret("/a", "1", Some("k")).unwrap();
        assert!(store.put_secret("/b", "2", None).is_err());
        assert_eq!(store.writes().len(), 1);
        assert_eq!(store.writes()[0].key_id.as_deref(), Some("k"));
    }
}
