use indexmap::IndexMap;
use stagecrypt_config::{ConfigTree, Scalar};
use stagecrypt_core::TreePath;

/// The configuration of one stage: no override markers, no tags, plaintext
/// secrets.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    stage: String,
    root: ConfigTree,
}

impl ResolvedConfig {
    #[must_use]
    pub fn new(stage: impl Into<String>, root: ConfigTree) -> Self {
        Self {
            stage: stage.into(),
            root,
        }
    }

    /// The stage this config was resolved for
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    #[must_use]
    pub fn root(&self) -> &ConfigTree {
        &self.root
    }

    /// Every scalar with its path, depth first in document order
    #[must_use]
    pub fn leaves(&self) -> Vec<(TreePath, &Scalar)> {
        let mut leaves = Vec::new();
        collect(&self.root, TreePath::root(), &mut leaves);
        leaves
    }

    /// Flat view keyed by display path (`servers[0].host`)
    #[must_use]
    pub fn flatten(&self) -> IndexMap<String, Scalar> {
        self.leaves()
            .into_iter()
            .map(|(path, scalar)| (path.to_string(), scalar.clone()))
            .collect()
    }
}

fn collect<'t>(node: &'t ConfigTree, path: TreePath, out: &mut Vec<(TreePath, &'t Scalar)>) {
    match node {
        ConfigTree::Scalar(scalar) => out.push((path, scalar)),
        ConfigTree::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                collect(item, path.index(index), out);
            }
        }
        ConfigTree::Mapping(map) => {
            for (key, value) in map {
                collect(value, path.key(key), out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_in_document_order() {
        let root: ConfigTree =
            serde_yaml::from_str("b: 1\na:\n  servers:\n    - host: x\n    - host: y\nc: ~\n")
                .unwrap();
        let resolved = ResolvedConfig::new("prod", root);
        let flat = resolved.flatten();
        let keys: Vec<_> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b", "a.servers[0].host", "a.servers[1].host", "c"]);
        assert_eq!(flat["c"], Scalar::Null);
        assert_eq!(resolved.stage(), "prod");
    }
}
