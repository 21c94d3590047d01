//! [`CryptoEngine`]: token encode/decode on top of a [`KeyRegistry`].

use std::sync::Arc;

use common::{token::extract_key_id, CryptoError, TokenParts};
use tracing::{debug, trace};

use super::cipher::{open, seal};
use crate::keys::{EncryptionKey, KeyRegistry};

/// Stateless encrypt/decrypt over an immutable [`KeyRegistry`].
///
/// Cheap to clone; the registry is shared behind an [`Arc`].
#[derive(Clone, Debug)]
pub struct CryptoEngine {
    registry: Arc<KeyRegistry>,
}

impl CryptoEngine {
    /// Wrap `registry`.
    pub fn new(registry: KeyRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The registry this engine encrypts and decrypts with.
    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Id of the key used when no key is named.
    pub fn default_key_id(&self) -> &str {
        self.registry.default_key_id()
    }

    /// Sorted ids of every key this engine can decrypt with.
    pub fn key_ids(&self) -> Vec<String> {
        self.registry.key_ids()
    }

    /// Encrypt `plaintext` under `key_id`, or under the default key when
    /// `key_id` is `None` or empty.
    ///
    /// Empty plaintext returns an empty token without touching the cipher.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::UnknownKey`] if the resolved key id is not registered.
    /// - [`CryptoError::EncryptionFailed`] if the AEAD refuses the input.
    pub fn encrypt(&self, plaintext: &str, key_id: Option<&str>) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let key = match key_id {
            Some(id) if !id.is_empty() => self.resolve(id)?,
            _ => self.registry.default_key(),
        };
        let token = seal(key, plaintext.as_bytes())?;
        trace!(key_id = %key.id(), "field value encrypted");
        Ok(token.to_string())
    }

    /// Decrypt a token produced by [`CryptoEngine::encrypt`].
    ///
    /// The empty token returns empty plaintext without touching the cipher.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::MalformedToken`] if the token does not split into three
    ///   non-empty segments or a segment is not base64.
    /// - [`CryptoError::UnknownKey`] if the token's key id is not registered.
    /// - [`CryptoError::DecryptionFailed`] if authentication fails.
    pub fn decrypt(&self, token: &str) -> Result<String, CryptoError> {
        if token.is_empty() {
            return Ok(String::new());
        }
        let parts = TokenParts::split(token)?;
        let key = self.resolve(parts.key_id)?;
        let decoded = parts.decode()?;
        let plaintext = open(key, &decoded)?;
        trace!(key_id = %key.id(), "field value decrypted");
        // Sealed from a `&str`, so a successful open always yields UTF-8.
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Decrypt `token` and encrypt the result under the default key.
    ///
    /// Migrates a value from an old key to the current one. The caller owns
    /// persisting the returned token.
    ///
    /// # Errors
    ///
    /// Any error from [`CryptoEngine::decrypt`] or [`CryptoEngine::encrypt`].
    pub fn re_encrypt(&self, token: &str) -> Result<String, CryptoError> {
        let plaintext = self.decrypt(token)?;
        let fresh = self.encrypt(&plaintext, None)?;
        debug!(
            from_key_id = %extract_key_id(token),
            to_key_id = %self.default_key_id(),
            "field value re-encrypted"
        );
        Ok(fresh)
    }

    /// Return the key id embedded in `token` without requiring that key to be
    /// registered.
    ///
    /// This is the text before the first `|`. A value with no separator is
    /// returned unchanged.
    pub fn extract_key_id(token: &str) -> &str {
        extract_key_id(token)
    }

    fn resolve(&self, key_id: &str) -> Result<&EncryptionKey, CryptoError> {
        self.registry
            .get(key_id)
            .ok_or_else(|| CryptoError::UnknownKey {
                key_id: key_id.to_owned(),
                available: self.registry.key_ids(),
            })
    }
}

impl From<KeyRegistry> for CryptoEngine {
    fn from(registry: KeyRegistry) -> Self {
        Self::new(registry)
    }
}
