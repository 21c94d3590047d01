//! Key material and the key registry.
//!
//! # Security invariants
//!
//! - Raw key bytes are never logged, formatted or included in error messages.
//!   Only key ids appear in diagnostics.
//! - A [`KeyRegistry`] is immutable once built; rotation constructs a new one.

pub mod material;
pub mod registry;

pub use material::{EncryptionKey, SecretBytes, KEY_LEN};
pub use registry::KeyRegistry;
