//! Output formats for a resolved configuration.
//!
//! Plaintext formats need nothing but the tree. The encrypted formats
//! re-encrypt with the key of a *key stage*, which is usually the stage that
//! was resolved but can be overridden to target another environment.

use crate::resolved::ResolvedConfig;
use indexmap::IndexMap;
use stagecrypt_config::{ConfigTree, Scalar};
use stagecrypt_core::{Result, ResultExt, TreePath};
use stagecrypt_crypto::CryptoGateway;
use std::fmt::Write as _;

/// How a resolved config is written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    /// Plaintext YAML
    #[default]
    Yaml,
    /// Plaintext, pretty-printed JSON
    Json,
    /// JSON with every leaf encrypted on its own
    EncryptedJson,
    /// The whole document as compact JSON, chunk-encrypted into a JSON array
    EncryptedBundle,
    /// A Rust module embedding the chunks and a loader that decrypts them
    Artifact,
}

/// Render `resolved` in `format`, encrypting with `key_stage` where needed
pub fn render(
    resolved: &ResolvedConfig,
    format: RenderFormat,
    gateway: &CryptoGateway<'_>,
    key_stage: &str,
) -> Result<String> {
    tracing::debug!(stage = %resolved.stage(), key_stage = %key_stage, ?format, "Rendering config");

    match format {
        RenderFormat::Yaml => Ok(serde_yaml::to_string(resolved.root())?),
        RenderFormat::Json => pretty_json(resolved.root()),
        RenderFormat::EncryptedJson => {
            let encrypted = encrypt_leaves(resolved.root(), &TreePath::root(), gateway, key_stage)?;
            pretty_json(&encrypted)
        }
        RenderFormat::EncryptedBundle => {
            let chunks = encrypt_document(resolved, gateway, key_stage)?;
            Ok(serde_json::to_string(&chunks)?)
        }
        RenderFormat::Artifact => {
            let chunks = encrypt_document(resolved, gateway, key_stage)?;
            Ok(artifact_module(resolved.stage(), &chunks))
        }
    }
}

fn pretty_json(tree: &ConfigTree) -> Result<String> {
    let mut text = serde_json::to_string_pretty(tree)?;
    text.push('\n');
    Ok(text)
}

fn encrypt_document(
    resolved: &ResolvedConfig,
    gateway: &CryptoGateway<'_>,
    key_stage: &str,
) -> Result<Vec<String>> {
    let compact = serde_json::to_string(resolved.root())?;
    let chunks = gateway.encrypt_chunked(&compact, key_stage)?;
    tracing::info!(chunks = chunks.len(), bytes = compact.len(), "Encrypted config bundle");
    Ok(chunks)
}

fn encrypt_leaves(
    node: &ConfigTree,
    path: &TreePath,
    gateway: &CryptoGateway<'_>,
    key_stage: &str,
) -> Result<ConfigTree> {
    match node {
        ConfigTree::Scalar(Scalar::Null) => Ok(node.clone()),
        ConfigTree::Scalar(scalar) => {
            let plaintext = match scalar {
                Scalar::String(value) => value.clone(),
                other => serde_json::to_string(other)?,
            };
            let ciphertext = gateway.encrypt_text(&plaintext, key_stage).at_path(path)?;
            Ok(ConfigTree::string(ciphertext))
        }
        ConfigTree::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| encrypt_leaves(item, &path.index(index), gateway, key_stage))
            .collect::<Result<Vec<_>>>()
            .map(ConfigTree::Sequence),
        ConfigTree::Mapping(map) => {
            let mut encrypted = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                encrypted.insert(
                    key.clone(),
                    encrypt_leaves(value, &path.key(key), gateway, key_stage)?,
                );
            }
            Ok(ConfigTree::Mapping(encrypted))
        }
    }
}

const ARTIFACT_LOADER: &str = r#"
/// Decrypt [`ENCRYPTED_CONFIG`] with KMS and parse the JSON it contains.
pub async fn load_config(
    client: &aws_sdk_kms::Client,
) -> Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>> {
    use base64::Engine as _;

    let mut config_json = Vec::new();
    for chunk in ENCRYPTED_CONFIG {
        let blob = base64::engine::general_purpose::STANDARD.decode(chunk)?;
        let output = client
            .decrypt()
            .ciphertext_blob(aws_sdk_kms::primitives::Blob::new(blob))
            .send()
            .await?;
        let plaintext = output.plaintext().ok_or("KMS returned no plaintext")?;
        config_json.extend_from_slice(plaintext.as_ref());
    }
    Ok(serde_json::from_slice(&config_json)?)
}
"#;

fn artifact_module(stage: &str, chunks: &[String]) -> String {
    let mut module = String::new();
    let _ = writeln!(module, "//! Encrypted configuration for stage `{stage}`.");
    let _ = writeln!(module, "//!");
    let _ = writeln!(module, "//! Generated by stagecrypt. Do not edit.");
    let _ = writeln!(module);
    let _ = writeln!(module, "pub const ENCRYPTED_CONFIG: &[&str] = &[");
    for chunk in chunks {
        // base64 needs no escaping inside a string literal
        let _ = writeln!(module, "    \"{chunk}\",");
    }
    let _ = writeln!(module, "];");
    module.push_str(ARTIFACT_LOADER);
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::resolve;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use stagecrypt_config::ConfigDocument;
    use stagecrypt_crypto::testing::{LocalKeyService, LocalProvider};

    const DOC: &str = r"
stages:
  prod:
    environment: prod
    key: prod-key
  dev:
    environment: dev
    key: dev-key
config:
  name: svc
  port: 8080
  debug: false
  missing: ~
  nested:
    inner: x
    list: [a, b]
";

    fn with_resolved<F>(stage: &str, check: F)
    where
        F: FnOnce(&ResolvedConfig, &CryptoGateway<'_>, &LocalProvider),
    {
        let doc = ConfigDocument::parse(DOC).unwrap();
        let registry = doc.registry().unwrap();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);
        let resolved = resolve(&doc.config, stage, &gateway).unwrap();
        check(&resolved, &gateway, &provider);
    }

    #[test]
    fn test_plaintext_formats_keep_order() {
        with_resolved("prod", |resolved, gateway, _| {
            let yaml = render(resolved, RenderFormat::Yaml, gateway, "prod").unwrap();
            assert!(yaml.starts_with("name: svc\nport: 8080\n"));

            let json = render(resolved, RenderFormat::Json, gateway, "prod").unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["nested"]["list"][1], "b");
            assert!(json.find("\"name\"").unwrap() < json.find("\"nested\"").unwrap());
        });
    }

    #[test]
    fn test_encrypted_json_encrypts_each_leaf() {
        with_resolved("prod", |resolved, gateway, provider| {
            let json = render(resolved, RenderFormat::EncryptedJson, gateway, "dev").unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(value["missing"].is_null());

            let decrypt = |v: &serde_json::Value| {
                let blob = STANDARD.decode(v.as_str().unwrap()).unwrap();
                assert_eq!(LocalKeyService::key_of(&blob).as_deref(), Some("alias/dev-key"));
                gateway.decrypt_text(v.as_str().unwrap(), "dev").unwrap()
            };
            assert_eq!(decrypt(&value["name"]), "svc");
            assert_eq!(decrypt(&value["port"]), "8080");
            assert_eq!(decrypt(&value["debug"]), "false");
            assert_eq!(decrypt(&value["nested"]["list"][0]), "a");
            // six non-null leaves
            assert_eq!(provider.key_service.encrypt_calls(), 6);
        });
    }

    #[test]
    fn test_bundle_decrypts_to_document() {
        with_resolved("prod", |resolved, gateway, _| {
            let bundle = render(resolved, RenderFormat::EncryptedBundle, gateway, "prod").unwrap();
            let chunks: Vec<String> = serde_json::from_str(&bundle).unwrap();
            assert_eq!(chunks.len(), 1);
            let json = gateway.decrypt_chunked(&chunks, "prod").unwrap();
            let tree: ConfigTree = serde_json::from_str(&json).unwrap();
            assert_eq!(&tree, resolved.root());
        });
    }

    #[test]
    fn test_bundle_chunks_large_documents() {
        let doc = ConfigDocument::parse(DOC).unwrap();
        let registry = doc.registry().unwrap();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider)
            .with_chunk_size(16)
            .unwrap();
        let resolved = resolve(&doc.config, "prod", &gateway).unwrap();

        let bundle = render(&resolved, RenderFormat::EncryptedBundle, &gateway, "prod").unwrap();
        let chunks: Vec<String> = serde_json::from_str(&bundle).unwrap();
        assert!(chunks.len() > 1);
        let json = gateway.decrypt_chunked(&chunks, "prod").unwrap();
        assert_eq!(json, serde_json::to_string(resolved.root()).unwrap());
    }

    #[test]
    fn test_artifact_embeds_chunks() {
        with_resolved("prod", |resolved, gateway, _| {
            let module = render(resolved, RenderFormat::Artifact, gateway, "prod").unwrap();
            assert!(module.contains("pub const ENCRYPTED_CONFIG: &[&str] = &["));
            assert!(module.contains("pub async fn load_config("));
            assert!(module.contains("stage `prod`"));

            let chunk_lines = module
                .lines()
                .filter(|line| line.starts_with("    \"") && line.ends_with("\","))
                .count();
            assert_eq!(chunk_lines, 1);
        });
    }

    #[test]
    fn test_unknown_key_stage() {
        with_resolved("prod", |resolved, gateway, _| {
            let err = render(resolved, RenderFormat::EncryptedBundle, gateway, "qa").unwrap_err();
            assert!(matches!(err, stagecrypt_core::Error::UnknownStage { .. }));
        });
    }
}
