//! Shared utilities for stagecrypt
//!
//! File writes that never leave a half-written config behind, and the
//! logging setup used by the binary.

pub mod atomic_file;
pub mod tracing;

pub use atomic_file::*;
