//! Error types shared across crates.
//!
//! No variant carries key bytes, plaintext or ciphertext. Messages may only
//! name key identifiers and struct field names.

use thiserror::Error;

use crate::direction::Direction;

/// Errors raised while building keys and registries.
///
/// All of these are configuration errors: they surface at startup and are
/// never recovered from at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A supplied key is not exactly 32 bytes.
    #[error("key '{key_id}' must be {expected} bytes for AES-256, got {actual} bytes")]
    InvalidKeyLength {
        key_id: String,
        expected: usize,
        actual: usize,
    },

    /// The key map is empty.
    #[error("at least one encryption key is required")]
    NoKeysProvided,

    /// The default key id is empty.
    #[error("default key ID is required")]
    MissingDefaultKeyId,

    /// The default key id does not name a key in the map.
    #[error("default key ID '{0}' not found in keys")]
    DefaultKeyNotFound(String),

    /// A key id is empty or contains the token separator.
    #[error("key ID '{0}' is invalid: must be non-empty and must not contain '|'")]
    InvalidKeyId(String),

    /// The same key id appears more than once in the supplied keys.
    #[error("key ID '{0}' is listed more than once")]
    DuplicateKeyId(String),

    /// Key configuration could not be read from its source.
    #[error("failed to read key configuration: {0}")]
    Config(String),
}

/// Errors raised by the encrypt/decrypt engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The token (or the caller) named a key the registry does not hold.
    ///
    /// Data written under a key that has since been retired stays
    /// undecryptable until a registry holding that key is used again.
    #[error("encryption key '{key_id}' not found, available: {available:?}")]
    UnknownKey {
        key_id: String,
        available: Vec<String>,
    },

    /// The token does not split into `id|nonce|ciphertext`, or a segment is
    /// not valid base64.
    #[error("malformed token: {0}")]
    MalformedToken(&'static str),

    /// AEAD authentication failed: wrong key, corruption or tampering.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The AEAD refused to seal the plaintext.
    #[error("encryption failed")]
    EncryptionFailed,
}

impl CryptoError {
    /// Returns `true` for [`CryptoError::UnknownKey`].
    pub fn is_unknown_key(&self) -> bool {
        matches!(self, CryptoError::UnknownKey { .. })
    }
}

/// A transform failed on a tagged field during traversal.
///
/// Fields visited before the failing one keep their transformed values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to {direction} field {field}: {source}")]
pub struct FieldTraversalError {
    /// Name of the struct field whose transform failed.
    pub field: &'static str,
    /// Direction of the traversal that failed.
    pub direction: Direction,
    /// Underlying engine error.
    #[source]
    pub source: CryptoError,
}

/// Top-level error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Field(#[from] FieldTraversalError),
}

impl VaultError {
    /// Returns `true` if the caller can reasonably carry on past this error,
    /// for example by skipping the row and alerting on a missing rotation key.
    ///
    /// Only unknown-key failures qualify; configuration errors are fatal and
    /// malformed or tampered data needs an operator.
    pub fn is_recoverable(&self) -> bool {
        match self {
            VaultError::Key(_) => false,
            VaultError::Crypto(e) => e.is_unknown_key(),
            VaultError::Field(e) => e.source.is_unknown_key(),
        }
    }
}
