use crate::runtime::BlockingRuntime;
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client;
use stagecrypt_config::KeyRef;
use stagecrypt_core::{Error, Result};
use stagecrypt_crypto::KeyService;

/// KMS client for one environment
#[derive(Debug, Clone)]
pub struct KmsKeyService {
    client: Client,
    runtime: BlockingRuntime,
}

impl KmsKeyService {
    #[must_use]
    pub fn new(client: Client, runtime: BlockingRuntime) -> Self {
        Self { client, runtime }
    }
}

impl KeyService for KmsKeyService {
    fn encrypt(&self, plaintext: &[u8], key: &KeyRef) -> Result<Vec<u8>> {
        tracing::debug!(key = %key, bytes = plaintext.len(), "KMS Encrypt");
        let output = self
            .runtime
            .block_on(
                self.client
                    .encrypt()
                    .key_id(key.as_str())
                    .plaintext(Blob::new(plaintext))
                    .send(),
            )?
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                Error::key_service_with_source("encrypt", message, e)
            })?;

        output
            .ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| Error::key_service("encrypt", "KMS returned no ciphertext"))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        tracing::debug!(bytes = ciphertext.len(), "KMS Decrypt");
        let output = self
            .runtime
            .block_on(
                self.client
                    .decrypt()
                    .ciphertext_blob(Blob::new(ciphertext))
                    .send(),
            )?
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                Error::key_service_with_source("decrypt", message, e)
            })?;

        output
            .plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| Error::key_service("decrypt", "KMS returned no plaintext"))
    }

    fn describe_key(&self, key: &KeyRef) -> Result<String> {
        let output = self
            .runtime
            .block_on(self.client.describe_key().key_id(key.as_str()).send())?
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                Error::key_service_with_source("describe key", message, e)
            })?;

        let key_id = output
            .key_metadata()
            .map(|metadata| metadata.key_id().to_string())
            .ok_or_else(|| {
                Error::key_service("describe key", format!("no metadata returned for '{key}'"))
            })?;
        tracing::debug!(key = %key, key_id = %key_id, "Resolved key id");
        Ok(key_id)
    }
}
