//! Tree transforms: `close`, `open` and `resolve`.
//!
//! All three are depth-first walks that carry the current [`TreePath`] and
//! the stage selector of the innermost `+` branch they are under. Any error
//! aborts the walk; callers never see a partially transformed tree.

use crate::resolved::ResolvedConfig;
use indexmap::IndexMap;
use stagecrypt_config::{
    select_branch, tree::selector_of, ConfigTree, MappingKind, Scalar, Selector, Tag,
};
use stagecrypt_core::{Error, Result, ResultExt, TreePath};
use stagecrypt_crypto::CryptoGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Close,
    Open,
}

/// Encrypt every `:encrypt:` leaf with the key of the stage branch it sits
/// in, producing `:decrypt:` ciphertext. Already closed values pass through.
pub fn close(tree: &ConfigTree, gateway: &CryptoGateway<'_>) -> Result<ConfigTree> {
    let closed = seal(tree, None, &TreePath::root(), gateway, Direction::Close)?;
    tracing::info!(encrypted = tree.count_tagged(true), "Closed config tree");
    Ok(closed)
}

/// Decrypt every `:decrypt:` leaf in the environment of the stage branch it
/// sits in, producing editable `:encrypt:` plaintext.
pub fn open(tree: &ConfigTree, gateway: &CryptoGateway<'_>) -> Result<ConfigTree> {
    let opened = seal(tree, None, &TreePath::root(), gateway, Direction::Open)?;
    tracing::info!(decrypted = tree.count_tagged(false), "Opened config tree");
    Ok(opened)
}

/// Produce the configuration of one stage.
///
/// Override mappings collapse to the branch selected for `stage`, ciphertext
/// on the selected branches is decrypted with the stage's own key service
/// and `:encrypt:` tags are stripped.
pub fn resolve(
    tree: &ConfigTree,
    stage: &str,
    gateway: &CryptoGateway<'_>,
) -> Result<ResolvedConfig> {
    gateway.registry().resolve(stage)?;
    let root = resolve_node(tree, stage, &TreePath::root(), gateway)?;
    tracing::debug!(stage = %stage, "Resolved config tree");
    Ok(ResolvedConfig::new(stage, root))
}

fn seal(
    node: &ConfigTree,
    stage: Option<&str>,
    path: &TreePath,
    gateway: &CryptoGateway<'_>,
    direction: Direction,
) -> Result<ConfigTree> {
    match node {
        ConfigTree::Scalar(scalar) => seal_scalar(scalar, stage, path, gateway, direction),
        ConfigTree::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| seal(item, stage, &path.index(index), gateway, direction))
            .collect::<Result<Vec<_>>>()
            .map(ConfigTree::Sequence),
        ConfigTree::Mapping(map) => {
            let kind = ConfigTree::mapping_kind(map, path)?;
            let mut sealed = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                let child = path.key(key);
                let child_stage = match kind {
                    MappingKind::Plain => stage,
                    MappingKind::StageOverride => {
                        let selector = selector_of(key);
                        Selector::parse(selector)
                            .map_err(|e| Error::malformed(&child, e.to_string()))?;
                        Some(selector)
                    }
                };
                sealed.insert(
                    key.clone(),
                    seal(value, child_stage, &child, gateway, direction)?,
                );
            }
            Ok(ConfigTree::Mapping(sealed))
        }
    }
}

fn seal_scalar(
    scalar: &Scalar,
    stage: Option<&str>,
    path: &TreePath,
    gateway: &CryptoGateway<'_>,
    direction: Direction,
) -> Result<ConfigTree> {
    let replaced = match (direction, scalar.tag()) {
        (Direction::Close, Some(Tag::Encrypt(plaintext))) => {
            let stage = owning_stage(stage, path, "encrypted")?;
            let ciphertext = gateway.encrypt_text(plaintext, stage).at_path(path)?;
            Scalar::decrypt_tagged(&ciphertext)
        }
        (Direction::Open, Some(Tag::Decrypt(ciphertext))) => {
            let stage = owning_stage(stage, path, "decrypted")?;
            let plaintext = gateway.decrypt_text(ciphertext, stage).at_path(path)?;
            Scalar::encrypt_tagged(&plaintext)
        }
        _ => scalar.clone(),
    };
    Ok(ConfigTree::Scalar(replaced))
}

fn owning_stage<'s>(stage: Option<&'s str>, path: &TreePath, action: &str) -> Result<&'s str> {
    stage.ok_or_else(|| {
        Error::malformed(
            path,
            format!("value cannot be {action} because it does not belong to a stage"),
        )
    })
}

fn resolve_node(
    node: &ConfigTree,
    stage: &str,
    path: &TreePath,
    gateway: &CryptoGateway<'_>,
) -> Result<ConfigTree> {
    match node {
        ConfigTree::Scalar(scalar) => {
            let resolved = match scalar.tag() {
                Some(Tag::Decrypt(ciphertext)) => {
                    Scalar::String(gateway.decrypt_text(ciphertext, stage).at_path(path)?)
                }
                Some(Tag::Encrypt(plaintext)) => Scalar::String(plaintext.to_string()),
                None => scalar.clone(),
            };
            Ok(ConfigTree::Scalar(resolved))
        }
        ConfigTree::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| resolve_node(item, stage, &path.index(index), gateway))
            .collect::<Result<Vec<_>>>()
            .map(ConfigTree::Sequence),
        ConfigTree::Mapping(map) => match ConfigTree::mapping_kind(map, path)? {
            MappingKind::Plain => {
                let mut resolved = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(
                        key.clone(),
                        resolve_node(value, stage, &path.key(key), gateway)?,
                    );
                }
                Ok(ConfigTree::Mapping(resolved))
            }
            MappingKind::StageOverride => {
                let selectors = map
                    .keys()
                    .map(|key| {
                        Selector::parse(selector_of(key))
                            .map_err(|e| Error::malformed(&path.key(key), e.to_string()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let index = select_branch(&selectors, stage)
                    .ok_or_else(|| Error::unknown_stage(stage).at_path(path))?;
                let branch = map
                    .get_index(index)
                    .map(|(_, value)| value)
                    .ok_or_else(|| Error::unknown_stage(stage).at_path(path))?;
                resolve_node(branch, stage, path, gateway)
            }
        },
    }
}
