//! Key-management boundary for stagecrypt
//!
//! No cryptography happens in this crate. It decides which key and which
//! environment's key service to use for a stage, moves bytes to and from
//! base64, and splits large payloads into chunks the key service accepts.
//!
//! - [`KeyService`] / [`KeyServiceProvider`]: the encrypt/decrypt boundary
//! - [`ParameterStore`] / [`ParameterStoreProvider`]: the secret sink boundary
//! - [`CryptoGateway`]: stage-aware front end with a per-environment client cache

pub mod chunking;
pub mod gateway;
pub mod service;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chunking::split_utf8;
pub use gateway::CryptoGateway;
pub use service::{KeyService, KeyServiceProvider, ParameterStore, ParameterStoreProvider};
