//! Core domain types, errors, and constants for `stagecrypt`.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by every crate in
//!   the workspace. Tree-walk errors carry the [`TreePath`] they occurred at.
//! - **`path`**: [`TreePath`], the location of a node inside a config tree.
//! - **`constants`**: tag prefixes, default file names and service limits.

pub mod constants;
pub mod errors;
pub mod path;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt, SinkFailure},
    path::{PathSegment, TreePath},
};
