//! The boundary an ORM adapter calls around each storage operation.
//!
//! Writes encrypt the model before it reaches storage; reads decrypt the
//! destination after storage has filled it. A failed encryption is returned
//! to the adapter and the storage operation is never started, so plaintext
//! cannot be written by mistake.

use std::future::Future;

use common::VaultError;
use thiserror::Error;
use tracing::debug;

use crate::{handle::EngineHandle, walker::EncryptedFields};

/// Failure of an intercepted storage operation.
#[derive(Debug, Error)]
pub enum InterceptError<E> {
    /// Encrypting or decrypting model fields failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The adapter's own storage operation failed.
    #[error("storage operation failed: {0}")]
    Storage(#[source] E),
}

impl<E> InterceptError<E> {
    /// The vault error, if encryption or decryption was the cause.
    pub fn vault(&self) -> Option<&VaultError> {
        match self {
            InterceptError::Vault(e) => Some(e),
            InterceptError::Storage(_) => None,
        }
    }
}

/// Applies field encryption at the two interception points of an adapter.
///
/// Cloning is cheap. [`Interceptor::with_key`] returns a copy that encrypts
/// under an explicit key instead of the default one.
#[derive(Clone, Debug)]
pub struct Interceptor {
    engine: EngineHandle,
    key_id: Option<String>,
}

impl Interceptor {
    /// Interceptor that encrypts under the handle's current default key.
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            key_id: None,
        }
    }

    /// Copy of this interceptor that encrypts under `key_id`.
    ///
    /// Decryption is unaffected: tokens always name their own key.
    pub fn with_key(&self, key_id: impl Into<String>) -> Self {
        Self {
            engine: self.engine.clone(),
            key_id: Some(key_id.into()),
        }
    }

    /// The key override, if any.
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// The engine handle this interceptor reads keys from.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Encrypt the tagged fields of `model` ahead of an insert or update.
    ///
    /// # Errors
    ///
    /// [`VaultError::Field`] naming the first field that failed. The model
    /// must not be written in that case.
    pub fn before_write<T: EncryptedFields + ?Sized>(
        &self,
        model: &mut T,
    ) -> Result<usize, VaultError> {
        let n = self
            .engine
            .current()
            .encrypt_fields(model, self.key_id.as_deref())?;
        Ok(n)
    }

    /// Decrypt the tagged fields of `dest` after a select or returning query.
    ///
    /// # Errors
    ///
    /// [`VaultError::Field`] naming the first field that failed.
    pub fn after_read<T: EncryptedFields + ?Sized>(&self, dest: &mut T) -> Result<usize, VaultError> {
        let n = self.engine.current().decrypt_fields(dest)?;
        Ok(n)
    }

    /// Encrypt a single value, e.g. a raw SQL parameter bound to an encrypted
    /// column.
    ///
    /// # Errors
    ///
    /// [`VaultError::Crypto`] if the key override is not registered.
    pub fn encrypt_value(&self, plaintext: &str) -> Result<String, VaultError> {
        let token = self
            .engine
            .current()
            .encrypt(plaintext, self.key_id.as_deref())?;
        Ok(token)
    }

    /// Encrypt `model` and hand it to the storage operation `op`.
    ///
    /// # Errors
    ///
    /// [`InterceptError::Vault`] if encryption failed, in which case `op` is
    /// never invoked; [`InterceptError::Storage`] if `op` failed.
    pub async fn write<T, R, E, F, Fut>(&self, mut model: T, op: F) -> Result<R, InterceptError<E>>
    where
        T: EncryptedFields,
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let fields = self.before_write(&mut model)?;
        debug!(fields = fields, "intercepted write");
        op(model).await.map_err(InterceptError::Storage)
    }

    /// Like [`Interceptor::write`], then decrypt the rows `op` returns
    /// (`INSERT ... RETURNING`).
    ///
    /// # Errors
    ///
    /// As [`Interceptor::write`], plus [`InterceptError::Vault`] if a returned
    /// row fails to decrypt.
    pub async fn write_returning<T, R, E, F, Fut>(
        &self,
        model: T,
        op: F,
    ) -> Result<R, InterceptError<E>>
    where
        T: EncryptedFields,
        R: EncryptedFields,
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut returned = self.write(model, op).await?;
        self.after_read(&mut returned)?;
        Ok(returned)
    }

    /// Run the storage read `op` and decrypt what it returns.
    ///
    /// # Errors
    ///
    /// [`InterceptError::Storage`] if `op` failed; [`InterceptError::Vault`]
    /// if a row fails to decrypt.
    pub async fn read<R, E, F, Fut>(&self, op: F) -> Result<R, InterceptError<E>>
    where
        R: EncryptedFields,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut rows = op().await.map_err(InterceptError::Storage)?;
        let fields = self.after_read(&mut rows)?;
        debug!(fields = fields, "intercepted read");
        Ok(rows)
    }
}

impl From<EngineHandle> for Interceptor {
    fn from(engine: EngineHandle) -> Self {
        Self::new(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyRegistry, KEY_LEN};

    crate::encrypted_model! {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Account {
            pub login: String,
            pub token: String [encrypted = "true"],
        }
    }

    fn interceptor() -> Interceptor {
        let registry =
            KeyRegistry::new([("1", [1u8; KEY_LEN]), ("2", [2u8; KEY_LEN])], "2").unwrap();
        Interceptor::new(EngineHandle::from(registry))
    }

    #[test]
    fn with_key_leaves_original_alone() {
        let base = interceptor();
        let keyed = base.with_key("1");
        assert_eq!(base.key_id(), None);
        assert_eq!(keyed.key_id(), Some("1"));
        assert!(keyed.encrypt_value("v").unwrap().starts_with("1|"));
        assert!(base.encrypt_value("v").unwrap().starts_with("2|"));
    }

    #[test]
    fn before_write_then_after_read() {
        let i = interceptor();
        let mut a = Account {
            login: "bob".into(),
            token: "s3cret".into(),
        };
        assert_eq!(i.before_write(&mut a).unwrap(), 1);
        assert_ne!(a.token, "s3cret");
        assert_eq!(i.after_read(&mut a).unwrap(), 1);
        assert_eq!(a.token, "s3cret");
    }

    #[test]
    fn unknown_override_is_a_crypto_error() {
        let err = interceptor().with_key("9").encrypt_value("v").unwrap_err();
        assert!(matches!(err, VaultError::Crypto(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn storage_error_has_no_vault_cause() {
        let e: InterceptError<std::io::Error> =
            InterceptError::Storage(std::io::Error::other("connection reset"));
        assert!(e.vault().is_none());
        assert_eq!(e.to_string(), "storage operation failed: connection reset");
    }
}
