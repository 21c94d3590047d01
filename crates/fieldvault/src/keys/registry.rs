//! [`KeyRegistry`]: the immutable set of keys an engine may use.

use std::collections::HashMap;

use common::KeyError;
use tracing::info;

use super::material::EncryptionKey;

/// Immutable map of key id → [`EncryptionKey`], plus the default key id used
/// for new encryptions.
///
/// Nothing is mutated after construction. Rotation builds a new registry
/// ([`KeyRegistry::rotate_to`], [`KeyRegistry::retire`]) and leaves this one
/// as it was, so a registry can be shared across threads without locks.
#[derive(Clone, Debug)]
pub struct KeyRegistry {
    keys: HashMap<String, EncryptionKey>,
    default_key_id: String,
}

impl KeyRegistry {
    /// Build a registry from `(id, raw key bytes)` pairs.
    ///
    /// Construction is all-or-nothing: every key is validated before the
    /// registry exists.
    ///
    /// # Errors
    ///
    /// - [`KeyError::NoKeysProvided`] if `keys` is empty.
    /// - [`KeyError::MissingDefaultKeyId`] if `default_key_id` is empty.
    /// - [`KeyError::DefaultKeyNotFound`] if `default_key_id` is not among the ids.
    /// - [`KeyError::InvalidKeyLength`] / [`KeyError::InvalidKeyId`] for a bad key.
    /// - [`KeyError::DuplicateKeyId`] if an id appears twice.
    pub fn new<I, K, V>(keys: I, default_key_id: &str) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<[u8]>,
    {
        let entries: Vec<(String, V)> = keys.into_iter().map(|(k, v)| (k.into(), v)).collect();

        if entries.is_empty() {
            return Err(KeyError::NoKeysProvided);
        }
        if default_key_id.is_empty() {
            return Err(KeyError::MissingDefaultKeyId);
        }
        if !entries.iter().any(|(id, _)| id == default_key_id) {
            return Err(KeyError::DefaultKeyNotFound(default_key_id.to_owned()));
        }

        let mut map = HashMap::with_capacity(entries.len());
        for (id, raw) in entries {
            if map.contains_key(&id) {
                return Err(KeyError::DuplicateKeyId(id));
            }
            let key = EncryptionKey::new(id.clone(), raw.as_ref())?;
            map.insert(id, key);
        }

        let registry = Self {
            keys: map,
            default_key_id: default_key_id.to_owned(),
        };
        info!(
            key_count = registry.len(),
            default_key_id = %registry.default_key_id,
            "key registry initialised"
        );
        Ok(registry)
    }

    /// Look up a key by id.
    pub fn get(&self, key_id: &str) -> Option<&EncryptionKey> {
        self.keys.get(key_id)
    }

    /// The key used when a caller does not name one.
    pub fn default_key(&self) -> &EncryptionKey {
        // Invariant established in `new` and preserved by `rotate_to`/`retire`.
        &self.keys[&self.default_key_id]
    }

    /// Id of the default key.
    pub fn default_key_id(&self) -> &str {
        &self.default_key_id
    }

    /// Returns `true` if `key_id` is registered.
    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    /// Number of registered keys. Never zero.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always `false`; a registry holds at least one key.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All registered key ids in lexicographic order.
    pub fn key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Return a new registry holding every key of this one plus `key_id`,
    /// which becomes the default.
    ///
    /// Replacing an existing id with different bytes is allowed; tokens sealed
    /// under the old bytes will then fail authentication.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeyLength`] / [`KeyError::InvalidKeyId`] for
    /// a bad key.
    pub fn rotate_to(&self, key_id: &str, raw: &[u8]) -> Result<Self, KeyError> {
        let key = EncryptionKey::new(key_id, raw)?;
        let mut keys = self.keys.clone();
        keys.insert(key_id.to_owned(), key);
        info!(
            key_count = keys.len(),
            default_key_id = %key_id,
            "key registry rotated"
        );
        Ok(Self {
            keys,
            default_key_id: key_id.to_owned(),
        })
    }

    /// Return a new registry without `key_id`.
    ///
    /// Values sealed under a retired key can no longer be decrypted by an
    /// engine built from the returned registry.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::DefaultKeyNotFound`] if `key_id` is the default key,
    /// since the result would have no default.
    pub fn retire(&self, key_id: &str) -> Result<Self, KeyError> {
        if key_id == self.default_key_id {
            return Err(KeyError::DefaultKeyNotFound(key_id.to_owned()));
        }
        let mut keys = self.keys.clone();
        keys.remove(key_id);
        Ok(Self {
            keys,
            default_key_id: self.default_key_id.clone(),
        })
    }
}
