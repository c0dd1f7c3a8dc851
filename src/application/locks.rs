//! Per-key async mutual exclusion

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per key, created on demand.
///
/// Operations on different keys never wait on each other.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on can go
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::<String>::new());
        let guard = locks.lock(&"a".to_string()).await;

        let other = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = other.lock(&"a".to_string()).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::<u64>::new();
        let _a = locks.lock(&1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&2)).await;
        assert!(b.is_ok());
    }
}
