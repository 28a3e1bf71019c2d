//! Stage resolution and rendering engine for stagecrypt
//!
//! ## Key Components
//!
//! - **`transform`**: [`close`] encrypts open-form secrets, [`open`] decrypts
//!   closed-form ciphertext and [`resolve`] produces a single stage's config.
//! - **`resolved`**: [`ResolvedConfig`], the tree for one stage plus a flat view.
//! - **`render`**: plaintext, encrypted and artifact output formats.
//! - **`sink`**: writes a resolved config into a parameter store.

pub mod render;
pub mod resolved;
pub mod sink;
pub mod transform;

pub use render::{render, RenderFormat};
pub use resolved::ResolvedConfig;
pub use sink::{ParameterStoreSink, PlannedParameter, SinkReport};
pub use transform::{close, open, resolve};
