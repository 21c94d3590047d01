//! Transparent field-level AES-256-GCM encryption for ORM models.
//!
//! Sensitive fields are marked on the model type. Adapters call an
//! [`Interceptor`] before every write and after every read, and the tagged
//! fields travel to storage as tokens:
//!
//! ```text
//! <key id>|<base64(nonce)>|<base64(ciphertext+tag)>
//! ```
//!
//! The key id prefix is what makes rotation work. New values are always
//! sealed under the registry's default key while values written under any
//! other registered key still decrypt.
//!
//! ```
//! use fieldvault::{encrypted_model, CryptoEngine, KeyRegistry};
//!
//! encrypted_model! {
//!     #[derive(Debug, Default)]
//!     pub struct User {
//!         pub id: i64,
//!         pub email: String [encrypted = "true"],
//!     }
//! }
//!
//! let registry = KeyRegistry::new([("1", [7u8; 32])], "1")?;
//! let engine = CryptoEngine::new(registry);
//!
//! let mut user = User { id: 1, email: "a@x.com".into() };
//! engine.encrypt_fields(&mut user, None)?;
//! assert!(user.email.starts_with("1|"));
//!
//! engine.decrypt_fields(&mut user)?;
//! assert_eq!(user.email, "a@x.com");
//! # Ok::<(), fieldvault::VaultError>(())
//! ```

pub mod config;
pub mod crypto;
pub mod handle;
pub mod intercept;
pub mod keys;
pub mod telemetry;
pub mod walker;

pub use common::{
    CryptoError, Direction, EncryptedToken, FieldTraversalError, KeyError, VaultError,
};
pub use config::{KeyConfig, Settings};
pub use crypto::CryptoEngine;
pub use handle::EngineHandle;
pub use intercept::{InterceptError, Interceptor};
pub use keys::{EncryptionKey, KeyRegistry, SecretBytes, KEY_LEN};
pub use telemetry::LogFormat;
pub use walker::{EncryptedFields, FieldValue, FieldWalker};
