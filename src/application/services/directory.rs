//! Instance directory - live bot instances by identity

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;

use crate::application::locks::KeyedLocks;
use crate::domain::entities::InstanceId;
use crate::domain::traits::Instance;

struct Entry {
    instance: Arc<dyn Instance>,
    attached_at: DateTime<Utc>,
    events: JoinHandle<()>,
}

/// Snapshot of one directory entry
#[derive(Clone)]
pub struct DirectoryEntry {
    pub instance: Arc<dyn Instance>,
    pub attached_at: DateTime<Utc>,
}

/// Process-wide map of attached instances.
///
/// Create and delete flows take the identity's lock first, so at most one
/// of them is in flight per instance.
pub struct InstanceDirectory {
    entries: RwLock<HashMap<InstanceId, Entry>>,
    locks: KeyedLocks<InstanceId>,
}

impl InstanceDirectory {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
        }
    }

    /// Serialize create/delete for one identity
    pub async fn lock(&self, id: InstanceId) -> OwnedMutexGuard<()> {
        self.locks.lock(&id).await
    }

    pub async fn get(&self, id: InstanceId) -> Option<Arc<dyn Instance>> {
        self.entries.read().await.get(&id).map(|e| Arc::clone(&e.instance))
    }

    pub async fn contains(&self, id: InstanceId) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Attached instances in ascending identity order
    pub async fn instances(&self) -> Vec<Arc<dyn Instance>> {
        self.entries().await.into_iter().map(|e| e.instance).collect()
    }

    pub async fn entries(&self) -> Vec<DirectoryEntry> {
        let entries = self.entries.read().await;
        let mut out: Vec<_> = entries
            .values()
            .map(|e| DirectoryEntry {
                instance: Arc::clone(&e.instance),
                attached_at: e.attached_at,
            })
            .collect();
        out.sort_by_key(|e| e.instance.id());
        out
    }

    /// Record an attached instance together with its event task.
    /// A previous entry for the same identity is replaced and its task stopped.
    pub async fn insert(&self, instance: Arc<dyn Instance>, events: JoinHandle<()>) {
        let entry = Entry {
            instance,
            attached_at: Utc::now(),
            events,
        };
        let previous = self.entries.write().await.insert(entry.instance.id(), entry);
        if let Some(previous) = previous {
            previous.events.abort();
        }
    }

    /// Drop an instance and stop its event task
    pub async fn remove(&self, id: InstanceId) -> Option<Arc<dyn Instance>> {
        let entry = self.entries.write().await.remove(&id)?;
        entry.events.abort();
        Some(entry.instance)
    }
}

impl Default for InstanceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::ConsoleAdapter;

    fn console(id: u64) -> Arc<dyn Instance> {
        Arc::new(ConsoleAdapter::new(InstanceId(id), std::env::temp_dir()))
    }

    #[tokio::test]
    async fn remove_stops_the_event_task() {
        let directory = InstanceDirectory::new();
        let (alive, stopped) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await
        });

        directory.insert(console(2), task).await;
        directory.insert(console(1), tokio::spawn(async {})).await;
        let ids: Vec<_> = directory.instances().await.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![InstanceId(1), InstanceId(2)]);

        assert!(directory.remove(InstanceId(2)).await.is_some());
        assert!(directory.remove(InstanceId(2)).await.is_none());
        assert!(stopped.await.is_err());
        assert_eq!(directory.len().await, 1);
    }
}
