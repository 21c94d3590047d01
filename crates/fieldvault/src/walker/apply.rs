//! Walker entry points on [`CryptoEngine`].

use common::{CryptoError, Direction, FieldTraversalError};

use super::traverse::{EncryptedFields, FieldWalker};
use crate::crypto::CryptoEngine;

impl CryptoEngine {
    /// Encrypt every tagged field reachable from `model` in place, under
    /// `key_id` or the default key.
    ///
    /// Returns the number of field values that changed.
    ///
    /// # Errors
    ///
    /// The first field that fails to encrypt. Fields visited before it stay
    /// encrypted.
    pub fn encrypt_fields<T: EncryptedFields + ?Sized>(
        &self,
        model: &mut T,
        key_id: Option<&str>,
    ) -> Result<usize, FieldTraversalError> {
        let transform = |plaintext: &str| self.encrypt(plaintext, key_id);
        FieldWalker::new(Direction::Encrypt, &transform).walk(model)
    }

    /// Decrypt every tagged field reachable from `model` in place.
    ///
    /// Values that do not look like tokens are left as they are.
    ///
    /// # Errors
    ///
    /// The first field that fails to decrypt, e.g. one sealed under a key this
    /// engine no longer holds.
    pub fn decrypt_fields<T: EncryptedFields + ?Sized>(
        &self,
        model: &mut T,
    ) -> Result<usize, FieldTraversalError> {
        let transform = |token: &str| self.decrypt(token);
        FieldWalker::new(Direction::Decrypt, &transform).walk(model)
    }

    /// Move every tagged token reachable from `model` onto the default key.
    ///
    /// Tokens already under the default key and plaintext values are left
    /// untouched, so only the returned count of fields needs persisting.
    ///
    /// # Errors
    ///
    /// The first field whose token cannot be decrypted.
    pub fn rekey_fields<T: EncryptedFields + ?Sized>(
        &self,
        model: &mut T,
    ) -> Result<usize, FieldTraversalError> {
        let transform = |token: &str| -> Result<String, CryptoError> {
            if CryptoEngine::extract_key_id(token) == self.default_key_id() {
                return Ok(token.to_owned());
            }
            self.re_encrypt(token)
        };
        FieldWalker::new(Direction::Rekey, &transform).walk(model)
    }
}
