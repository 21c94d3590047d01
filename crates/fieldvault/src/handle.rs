//! Shared, hot-swappable engine for key rotation at runtime.
//!
//! Readers take a lock-free snapshot with [`EngineHandle::current`]. Rotation
//! stores a whole new engine; operations already holding a snapshot finish on
//! the keys they started with.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::{crypto::CryptoEngine, keys::KeyRegistry};

/// Cloneable handle to the engine currently in use.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    inner: Arc<ArcSwap<CryptoEngine>>,
}

impl EngineHandle {
    /// Create a handle serving `engine`.
    pub fn new(engine: CryptoEngine) -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(engine))),
        }
    }

    /// Snapshot of the current engine.
    ///
    /// Lock-free; safe to call on every read and write.
    pub fn current(&self) -> Arc<CryptoEngine> {
        self.inner.load_full()
    }

    /// Atomically replace the engine with one built from `registry`.
    ///
    /// Every clone of this handle sees the new engine on its next
    /// [`EngineHandle::current`].
    pub fn rotate(&self, registry: KeyRegistry) {
        let engine = CryptoEngine::new(registry);
        info!(
            default_key_id = %engine.default_key_id(),
            key_count = engine.registry().len(),
            "encryption engine rotated"
        );
        self.inner.store(Arc::new(engine));
    }
}

impl From<CryptoEngine> for EngineHandle {
    fn from(engine: CryptoEngine) -> Self {
        Self::new(engine)
    }
}

impl From<KeyRegistry> for EngineHandle {
    fn from(registry: KeyRegistry) -> Self {
        Self::new(CryptoEngine::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LEN;

    fn registry() -> KeyRegistry {
        KeyRegistry::new([("1", [1u8; KEY_LEN])], "1").unwrap()
    }

    #[test]
    fn rotate_is_visible_to_all_clones() {
        let handle = EngineHandle::from(registry());
        let other = handle.clone();
        let rotated = handle.current().registry().rotate_to("2", &[2u8; KEY_LEN]).unwrap();
        handle.rotate(rotated);
        assert_eq!(other.current().default_key_id(), "2");
        assert_eq!(other.current().key_ids(), vec!["1", "2"]);
    }

    #[test]
    fn snapshot_outlives_rotation() {
        let handle = EngineHandle::from(registry());
        let snapshot = handle.current();
        let token = snapshot.encrypt("kept", None).unwrap();

        handle.rotate(KeyRegistry::new([("3", [3u8; KEY_LEN])], "3").unwrap());

        assert_eq!(snapshot.decrypt(&token).unwrap(), "kept");
        assert!(handle.current().decrypt(&token).unwrap_err().is_unknown_key());
    }
}
