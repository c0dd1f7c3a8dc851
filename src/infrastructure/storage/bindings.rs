//! Binding store - which plugins each instance has enabled

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use super::write_atomic;
use crate::application::errors::StorageError;
use crate::application::locks::KeyedLocks;
use crate::application::plugins::PluginRegistry;
use crate::domain::entities::{BindingRecord, InstanceId};
use crate::domain::traits::Instance;

/// File name of the binding record inside an instance's working directory
pub const BINDING_FILE: &str = "setting";

/// JSON binding records, one file per instance.
///
/// Read-modify-write cycles are serialized per instance.
pub struct BindingStore {
    locks: KeyedLocks<InstanceId>,
}

impl BindingStore {
    pub fn new() -> Self {
        Self {
            locks: KeyedLocks::new(),
        }
    }

    pub fn path(instance: &dyn Instance) -> PathBuf {
        instance.data_dir().join(BINDING_FILE)
    }

    /// Read the record; a missing or malformed file yields an empty record
    pub async fn load(&self, instance: &dyn Instance) -> BindingRecord {
        let path = Self::path(instance);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(instance = %instance.id(), error = %e, "failed to read binding record");
                }
                return BindingRecord::default();
            }
        };

        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!(instance = %instance.id(), error = %e, "malformed binding record, starting empty");
            BindingRecord::default()
        })
    }

    /// Like `load`, but only a missing or malformed file reads as empty
    async fn read_for_update(&self, instance: &dyn Instance) -> Result<BindingRecord, StorageError> {
        let raw = match fs::read(Self::path(instance)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BindingRecord::default()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!(instance = %instance.id(), error = %e, "malformed binding record, replacing it");
            BindingRecord::default()
        }))
    }

    /// Atomically overwrite the record
    pub async fn save(&self, instance: &dyn Instance, record: &BindingRecord) -> Result<(), StorageError> {
        let _guard = self.locks.lock(&instance.id()).await;
        self.write(instance, record).await
    }

    async fn write(&self, instance: &dyn Instance, record: &BindingRecord) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&Self::path(instance), &json).await?;
        Ok(())
    }

    /// Load, modify and save the record under the instance's lock
    pub async fn update<T>(
        &self,
        instance: &dyn Instance,
        f: impl FnOnce(&mut BindingRecord) -> T,
    ) -> Result<T, StorageError> {
        let _guard = self.locks.lock(&instance.id()).await;
        let mut record = self.read_for_update(instance).await?;
        let out = f(&mut record);
        self.write(instance, &record).await?;
        Ok(out)
    }

    pub async fn add_plugin(&self, instance: &dyn Instance, plugin: &str) -> Result<(), StorageError> {
        self.update(instance, |record| {
            record.insert(plugin);
        })
        .await
    }

    pub async fn remove_plugin(&self, instance: &dyn Instance, plugin: &str) -> Result<(), StorageError> {
        self.update(instance, |record| {
            record.remove(plugin);
        })
        .await
    }

    /// Re-enable every plugin listed in the instance's record.
    ///
    /// Failures are logged and skipped. Returns how many plugins were bound.
    pub async fn restore_all(&self, registry: &PluginRegistry, instance: Arc<dyn Instance>) -> usize {
        let id = instance.id();
        let record = self.load(instance.as_ref()).await;
        let mut restored = 0;

        for name in &record.plugins {
            match registry.enable(name, Arc::clone(&instance)).await {
                Ok(()) => restored += 1,
                Err(e) => warn!(plugin = %name, instance = %id, error = %e, "failed to restore plugin"),
            }
        }

        info!(instance = %id, restored, listed = record.plugins.len(), "bindings restored");
        restored
    }
}

impl Default for BindingStore {
    fn default() -> Self {
        Self::new()
    }
}
