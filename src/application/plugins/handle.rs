//! Plugin handle - one loaded generation of a plugin and the instances bound to it

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use super::Generation;
use crate::application::errors::PluginError;
use crate::domain::entities::InstanceId;
use crate::domain::traits::{Extension, HookError, HookResult, Instance};
use crate::infrastructure::plugins::LoadedModule;
use crate::infrastructure::storage::BindingStore;

/// Wraps one loaded module and tracks its binds.
///
/// Lifecycle methods do not lock by themselves; the registry serializes
/// them per plugin name.
pub struct PluginHandle {
    name: String,
    location: PathBuf,
    generation: Generation,
    binds: Mutex<BTreeMap<InstanceId, Arc<dyn Instance>>>,
    module: LoadedModule,
}

enum Hook {
    Enable(Arc<dyn Instance>),
    Disable(Arc<dyn Instance>),
    Destroy,
}

impl PluginHandle {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>, generation: Generation, module: LoadedModule) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            generation,
            binds: Mutex::new(BTreeMap::new()),
            module,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn version(&self) -> Option<&str> {
        self.module.manifest().map(|m| m.version.as_str())
    }

    pub fn is_bound(&self, id: InstanceId) -> bool {
        self.binds().contains_key(&id)
    }

    /// Identities currently bound, in ascending order
    pub fn bound_ids(&self) -> Vec<InstanceId> {
        self.binds().keys().copied().collect()
    }

    pub fn bound_instances(&self) -> Vec<Arc<dyn Instance>> {
        self.binds().values().cloned().collect()
    }

    fn binds(&self) -> std::sync::MutexGuard<'_, BTreeMap<InstanceId, Arc<dyn Instance>>> {
        self.binds.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a hook on its own task so a panicking extension only fails this call
    async fn call(&self, hook: Hook) -> HookResult {
        let extension: Arc<dyn Extension> = self.module.extension();
        let task = tokio::spawn(async move {
            match hook {
                Hook::Enable(instance) => extension.enable(instance).await,
                Hook::Disable(instance) => extension.disable(instance).await,
                Hook::Destroy => extension.destroy().await,
            }
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(HookError::Failed("hook panicked".to_string())),
            Err(e) => Err(HookError::Failed(e.to_string())),
        }
    }

    /// Bind `instance`: run the enable hook, persist, then record the bind
    pub(crate) async fn enable(&self, instance: Arc<dyn Instance>, store: &BindingStore) -> Result<(), PluginError> {
        let id = instance.id();
        if self.is_bound(id) {
            return Err(PluginError::AlreadyBound {
                plugin: self.name.clone(),
                instance: id,
            });
        }

        match self.call(Hook::Enable(Arc::clone(&instance))).await {
            Ok(()) => {}
            Err(HookError::NotImplemented) => return Err(PluginError::NoEnableHook(self.name.clone())),
            Err(HookError::Failed(message)) => {
                error!(plugin = %self.name, instance = %id, %message, "enable hook failed");
                return Err(PluginError::HookFailed {
                    plugin: self.name.clone(),
                    instance: id,
                    message,
                });
            }
        }

        if let Err(source) = store.add_plugin(instance.as_ref(), &self.name).await {
            error!(plugin = %self.name, instance = %id, error = %source, "failed to persist enable, rolling back");
            if let Err(HookError::Failed(message)) = self.call(Hook::Disable(Arc::clone(&instance))).await {
                warn!(plugin = %self.name, instance = %id, %message, "rollback disable hook failed");
            }
            return Err(PluginError::PersistFailed { instance: id, source });
        }

        self.binds().insert(id, instance);
        info!(plugin = %self.name, instance = %id, generation = %self.generation, "plugin enabled");
        Ok(())
    }

    /// Run the disable hook. A missing hook only skips the teardown.
    async fn teardown(&self, instance: &Arc<dyn Instance>) -> Result<(), PluginError> {
        let id = instance.id();
        match self.call(Hook::Disable(Arc::clone(instance))).await {
            Ok(()) => Ok(()),
            Err(HookError::NotImplemented) => {
                debug!(plugin = %self.name, instance = %id, "no disable hook, removing binding only");
                Ok(())
            }
            Err(HookError::Failed(message)) => {
                error!(plugin = %self.name, instance = %id, %message, "disable hook failed");
                Err(PluginError::HookFailed {
                    plugin: self.name.clone(),
                    instance: id,
                    message,
                })
            }
        }
    }

    /// Unbind `instance`: run the disable hook, persist, then drop the bind
    pub(crate) async fn disable(&self, instance: &Arc<dyn Instance>, store: &BindingStore) -> Result<(), PluginError> {
        let id = instance.id();
        if !self.is_bound(id) {
            return Err(PluginError::NotBound {
                plugin: self.name.clone(),
                instance: id,
            });
        }

        self.teardown(instance).await?;

        store
            .remove_plugin(instance.as_ref(), &self.name)
            .await
            .map_err(|source| PluginError::PersistFailed { instance: id, source })?;

        self.binds().remove(&id);
        info!(plugin = %self.name, instance = %id, generation = %self.generation, "plugin disabled");
        Ok(())
    }

    /// Drop the bind without running any hook; with a store, also drop it from the record
    pub(crate) async fn forget(&self, instance: &Arc<dyn Instance>, store: Option<&BindingStore>) {
        let id = instance.id();
        self.binds().remove(&id);
        if let Some(store) = store {
            if let Err(e) = store.remove_plugin(instance.as_ref(), &self.name).await {
                warn!(plugin = %self.name, instance = %id, error = %e, "stale binding left on disk");
            }
        }
    }

    /// Force every bound instance out, returning who was bound.
    ///
    /// The disable hook runs for each instance, but a failure does not keep
    /// it bound. Binding records are only touched when `store` is given.
    pub(crate) async fn evict(&self, store: Option<&BindingStore>) -> Vec<Arc<dyn Instance>> {
        let bound = self.bound_instances();

        for instance in &bound {
            if let Err(e) = self.teardown(instance).await {
                warn!(plugin = %self.name, instance = %instance.id(), error = %e, "forcing unbind");
            }
            self.forget(instance, store).await;
        }

        bound
    }

    /// Invoke the destroy hook; failures are logged, never returned
    pub(crate) async fn destroy(&self) {
        match self.call(Hook::Destroy).await {
            Ok(()) | Err(HookError::NotImplemented) => {}
            Err(HookError::Failed(message)) => {
                warn!(plugin = %self.name, generation = %self.generation, %message, "destroy hook failed");
            }
        }
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("generation", &self.generation)
            .field("binds", &self.bound_ids())
            .finish()
    }
}
