use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by id, created on first use.
///
/// Holders of different keys never contend; two holders of the same key
/// run one after the other. An entry is dropped again once its last holder
/// or waiter is gone, so ids of deleted groups do not accumulate.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held lock on one key of a [`KeyedLocks`].
pub struct KeyedGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a KeyedLocks,
    key: String,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.prune(&self.key);
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // strong count 1: only the map refers to the mutex
    fn prune(&self, key: &str) {
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let guard = self.entry(key).lock_owned().await;
        KeyedGuard {
            guard: Some(guard),
            locks: self,
            key: key.to_string(),
        }
    }

    /// `None` when another holder has the key.
    pub fn try_lock(&self, key: &str) -> Option<KeyedGuard<'_>> {
        let guard = self.entry(key).try_lock_owned().ok()?;
        Some(KeyedGuard {
            guard: Some(guard),
            locks: self,
            key: key.to_string(),
        })
    }
}
