//! A single validated key and the secret buffers that feed it.

use std::fmt;

use aes_gcm::{aead::KeyInit, Aes256Gcm};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{KeyError, TOKEN_SEPARATOR};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Owned secret bytes, zeroed when dropped.
///
/// Carries key material from configuration to [`EncryptionKey::new`]. The
/// length is not checked here; that happens when the key is built so the
/// error can name the key id.
///
/// In serialised configuration the bytes are standard base64.
#[derive(Clone, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(try_from = "String")]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode standard base64.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Config`] if `encoded` is not valid base64.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        STANDARD
            .decode(encoded.trim())
            .map(Self)
            .map_err(|_| KeyError::Config("key material is not valid base64".into()))
    }

    /// Borrow the secret bytes. Use them immediately; do not store the slice.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Number of secret bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("SecretBytes([REDACTED])")
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SecretBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl TryFrom<String> for SecretBytes {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base64(&value)
    }
}

/// One registered key: its id and the AES-256-GCM cipher built from it.
///
/// The supplied bytes are used directly as the AES-256 key; there is no
/// derivation and no salt. Only the expanded cipher state is retained.
#[derive(Clone)]
pub struct EncryptionKey {
    id: String,
    cipher: Aes256Gcm,
}

impl EncryptionKey {
    /// Validate `raw` and build the cipher for key `id`.
    ///
    /// # Errors
    ///
    /// - [`KeyError::InvalidKeyId`] if `id` is empty or contains `|`.
    /// - [`KeyError::InvalidKeyLength`] if `raw` is not [`KEY_LEN`] bytes.
    pub fn new(id: impl Into<String>, raw: &[u8]) -> Result<Self, KeyError> {
        let id = id.into();
        if id.is_empty() || id.contains(TOKEN_SEPARATOR) {
            return Err(KeyError::InvalidKeyId(id));
        }
        let invalid_length = || KeyError::InvalidKeyLength {
            key_id: id.clone(),
            expected: KEY_LEN,
            actual: raw.len(),
        };
        if raw.len() != KEY_LEN {
            return Err(invalid_length());
        }
        let cipher = Aes256Gcm::new_from_slice(raw).map_err(|_| invalid_length())?;
        Ok(Self { id, cipher })
    }

    /// The key id embedded in every token this key seals.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn cipher(&self) -> &Aes256Gcm {
        &self.cipher
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("id", &self.id)
            .field("cipher", &"[REDACTED]")
            .finish()
    }
}
