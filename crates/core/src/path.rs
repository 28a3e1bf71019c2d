//! Locations inside a config tree.
//!
//! A [`TreePath`] is built while walking a tree and travels with every error
//! raised during the walk. It has two renderings:
//!
//! - the display form, `servers[0].host`, used in messages;
//! - the parameter form, `/prefix/servers/0/host`, used by the parameter
//!   store sink. List indices become plain numeric segments there.

use std::fmt::{self, Display};

/// One step of a [`TreePath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A mapping key (stage markers such as `+prod` included)
    Key(String),
    /// A sequence index
    Index(usize),
}

/// Path from the root of a config tree to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TreePath(Vec<PathSegment>);

impl TreePath {
    /// The empty path, pointing at the root
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Whether this path points at the root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of a mapping child
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    /// Path of a sequence element
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Join the path under a slash-separated prefix.
    ///
    /// A trailing slash on the prefix is ignored so that `/svc/` and `/svc`
    /// produce the same names.
    #[must_use]
    pub fn to_parameter_name(&self, prefix: &str) -> String {
        let mut name = prefix.trim_end_matches('/').to_string();
        for segment in &self.0 {
            name.push('/');
            match segment {
                PathSegment::Key(key) => name.push_str(key),
                PathSegment::Index(index) => name.push_str(&index.to_string()),
            }
        }
        name
    }
}

impl Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
