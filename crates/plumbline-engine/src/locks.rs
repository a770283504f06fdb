//! Per-entity async locks.
//!
//! The engines serialize work per conversation and per walkthrough session
//! rather than globally: two exchanges on different conversations proceed in
//! parallel, two on the same conversation queue up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A registry of async locks keyed by entity id.
///
/// Guards are owned, so a caller can hold one across await points for the
/// whole of an exchange. Entries are created on first use and kept for the
/// life of the registry; each engine owns its own registry, so conversation
/// and session locking never share a key space.
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `key`, waiting while another task holds it.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}
