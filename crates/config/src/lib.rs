//! Configuration model and file formats for stagecrypt
//!
//! This crate owns everything that can be decided without talking to a key
//! service: the [`ConfigTree`] data model, stage definitions and matching
//! ([`StageRegistry`]), key reference normalization ([`KeyRef`]), the on-disk
//! [`ConfigDocument`] and the [`EnvironmentCatalog`].

pub mod document;
pub mod environments;
pub mod keys;
pub mod stages;
pub mod tree;

pub use document::{ConfigDocument, DocumentFormat};
pub use environments::{EnvironmentCatalog, EnvironmentEntry};
pub use keys::KeyRef;
pub use stages::{select_branch, Selector, StageDefinition, StageRegistry, StageTable};
pub use tree::{ConfigTree, MappingKind, Scalar, Tag};
