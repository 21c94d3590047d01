//! Shared error types, the encrypted token wire format and the traversal
//! direction used by `fieldvault` crates.

pub mod direction;
pub mod error;
pub mod token;

pub use direction::Direction;
pub use error::{CryptoError, FieldTraversalError, KeyError, VaultError};
pub use token::{EncryptedToken, TokenParts, NONCE_LEN, TAG_LEN, TOKEN_SEPARATOR};
