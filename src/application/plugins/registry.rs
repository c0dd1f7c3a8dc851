//! Plugin registry - process-wide catalog of loaded plugins

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{error, info, warn};

use super::{Generation, PluginHandle};
use crate::application::errors::PluginError;
use crate::application::locks::KeyedLocks;
use crate::domain::traits::Instance;
use crate::infrastructure::plugins::{ModuleLoader, PluginResolver};
use crate::infrastructure::storage::BindingStore;

pub use crate::infrastructure::plugins::{DiscoveredPlugin, PluginOrigin};

/// Registry for managing loaded plugins.
///
/// Every operation that changes a plugin's bind set runs under that
/// plugin name's lock; unrelated plugins proceed concurrently.
pub struct PluginRegistry {
    resolver: PluginResolver,
    loader: Arc<dyn ModuleLoader>,
    store: Arc<BindingStore>,
    plugins: RwLock<HashMap<String, Arc<PluginHandle>>>,
    locks: KeyedLocks<String>,
    generations: AtomicU64,
}

impl PluginRegistry {
    pub fn new(resolver: PluginResolver, loader: Arc<dyn ModuleLoader>, store: Arc<BindingStore>) -> Self {
        Self {
            resolver,
            loader,
            store,
            plugins: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
            generations: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<BindingStore> {
        &self.store
    }

    /// Locate a plugin on disk without loading it
    pub async fn resolve(&self, name: &str) -> Result<PathBuf, PluginError> {
        self.resolver.resolve(name).await
    }

    /// All installable plugins visible on disk, loaded or not
    pub async fn list_discoverable(&self) -> Vec<DiscoveredPlugin> {
        self.resolver.discover().await
    }

    /// Get a loaded plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<PluginHandle>> {
        self.plugins.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    /// Check if a plugin is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Loaded plugins sorted by name
    pub fn handles(&self) -> Vec<Arc<PluginHandle>> {
        let mut handles: Vec<_> = self
            .plugins
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        handles.sort_by(|a, b| a.name().cmp(b.name()));
        handles
    }

    /// Number of plugins bound to `instance`
    pub fn bound_count(&self, instance: &dyn Instance) -> usize {
        let id = instance.id();
        self.handles().iter().filter(|h| h.is_bound(id)).count()
    }

    /// Load a plugin, or return the cached handle
    pub async fn load(&self, name: &str) -> Result<Arc<PluginHandle>, PluginError> {
        let _guard = self.locks.lock(&name.to_string()).await;
        self.load_locked(name).await
    }

    async fn load_locked(&self, name: &str) -> Result<Arc<PluginHandle>, PluginError> {
        if let Some(handle) = self.get(name) {
            return Ok(handle);
        }

        let location = self.resolver.resolve(name).await?;
        let generation = Generation(self.generations.fetch_add(1, Ordering::Relaxed) + 1);
        let module = self.loader.load(name, &location, generation)?;
        let handle = Arc::new(PluginHandle::new(name, location, generation, module));

        self.plugins
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), Arc::clone(&handle));

        info!(plugin = %name, generation = %generation, location = %handle.location().display(), "plugin loaded");
        Ok(handle)
    }

    /// Load if needed, then enable on `instance`
    pub async fn enable(&self, name: &str, instance: Arc<dyn Instance>) -> Result<(), PluginError> {
        let _guard = self.locks.lock(&name.to_string()).await;
        let handle = self.load_locked(name).await?;
        handle.enable(instance, &self.store).await
    }

    /// Disable a loaded plugin on `instance`
    pub async fn disable(&self, name: &str, instance: &Arc<dyn Instance>) -> Result<(), PluginError> {
        let _guard = self.locks.lock(&name.to_string()).await;
        let handle = self.get(name).ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        handle.disable(instance, &self.store).await
    }

    /// Unbind every instance, run the destroy hook and drop the generation
    pub async fn unload(&self, name: &str) -> Result<(), PluginError> {
        let _guard = self.locks.lock(&name.to_string()).await;
        self.unload_locked(name, true).await.map(|_| ())
    }

    /// With `forget_records` off, binding records keep the plugin so it can be restored later
    async fn unload_locked(&self, name: &str, forget_records: bool) -> Result<Vec<Arc<dyn Instance>>, PluginError> {
        let handle = self.get(name).ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        let store = forget_records.then(|| self.store.as_ref());
        let evicted = handle.evict(store).await;
        handle.destroy().await;

        self.plugins.write().unwrap_or_else(|e| e.into_inner()).remove(name);
        info!(plugin = %name, generation = %handle.generation(), unbound = evicted.len(), "plugin unloaded");
        Ok(evicted)
    }

    /// Unload, load a fresh generation from disk and re-enable it everywhere it was bound.
    ///
    /// Binding records are kept across the swap. If the fresh generation
    /// cannot be loaded, every previously bound instance is reported and its
    /// record still lists the plugin.
    pub async fn reboot(&self, name: &str) -> Result<Generation, PluginError> {
        let _guard = self.locks.lock(&name.to_string()).await;

        let bound = self.unload_locked(name, false).await?;
        let handle = match self.load_locked(name).await {
            Ok(handle) => handle,
            Err(e) if bound.is_empty() => return Err(e),
            Err(e) => {
                error!(plugin = %name, error = %e, "reload failed, plugin left unloaded");
                let reason = e.to_string();
                return Err(PluginError::PartialReboot {
                    plugin: name.to_string(),
                    failed: bound.iter().map(|i| (i.id(), reason.clone())).collect(),
                });
            }
        };

        let mut failed = Vec::new();
        for instance in bound {
            let id = instance.id();
            if let Err(e) = handle.enable(Arc::clone(&instance), &self.store).await {
                warn!(plugin = %name, instance = %id, error = %e, "could not restore after reboot");
                handle.forget(&instance, Some(self.store.as_ref())).await;
                failed.push((id, e.to_string()));
            }
        }

        if !failed.is_empty() {
            return Err(PluginError::PartialReboot {
                plugin: name.to_string(),
                failed,
            });
        }

        info!(plugin = %name, generation = %handle.generation(), "plugin rebooted");
        Ok(handle.generation())
    }

    /// Disable every plugin bound to `instance`, swallowing individual failures.
    ///
    /// Returns how many plugins were disabled cleanly.
    pub async fn disable_all(&self, instance: &Arc<dyn Instance>) -> usize {
        let id = instance.id();
        let mut disabled = 0;

        for name in self.handles().iter().map(|h| h.name().to_string()) {
            let _guard = self.locks.lock(&name).await;
            let Some(handle) = self.get(&name) else { continue };
            if !handle.is_bound(id) {
                continue;
            }
            match handle.disable(instance, &self.store).await {
                Ok(()) => disabled += 1,
                Err(e) => warn!(plugin = %name, instance = %id, error = %e, "ignoring failure while disabling all"),
            }
        }

        disabled
    }

    /// Force `instance` out of every bind set and its record without running hooks.
    ///
    /// Used after `disable_all` when the instance goes away; returns how
    /// many plugins still held it.
    pub async fn release(&self, instance: &Arc<dyn Instance>) -> usize {
        let id = instance.id();
        let mut released = 0;

        for name in self.handles().iter().map(|h| h.name().to_string()) {
            let _guard = self.locks.lock(&name).await;
            let Some(handle) = self.get(&name) else { continue };
            if handle.is_bound(id) {
                handle.forget(instance, Some(self.store.as_ref())).await;
                warn!(plugin = %name, instance = %id, "released stale binding");
                released += 1;
            }
        }

        released
    }
}
