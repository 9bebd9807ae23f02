//! Keyed async mutex registry.
//!
//! One `tokio::sync::Mutex` per key, created on demand and dropped with the
//! last guard, so the registry only holds keys that are in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Serializes work per key; different keys never contend.
#[derive(Debug, Default, Clone)]
pub struct KeyedLocks {
    registry: Registry,
}

/// Holds the lock for one key until dropped.
#[derive(Debug)]
pub struct KeyGuard {
    registry: Registry,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for the lock on `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mut slot = KeyGuard {
            registry: self.registry.clone(),
            key: key.to_string(),
            guard: None,
        };
        let mutex = self.entry(key);
        slot.guard = Some(mutex.lock_owned().await);
        slot
    }

    /// Take the lock on `key` only if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard> {
        let mut slot = KeyGuard {
            registry: self.registry.clone(),
            key: key.to_string(),
            guard: None,
        };
        let mutex = self.entry(key);
        slot.guard = Some(mutex.try_lock_owned().ok()?);
        Some(slot)
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.registry.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        // Only the registry still references the mutex: nobody holds or waits
        if map
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            map.remove(&self.key);
        }
    }
}
