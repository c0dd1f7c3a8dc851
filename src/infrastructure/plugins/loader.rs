//! Plugin loader - Instantiates extension modules from disk or from in-process registrations

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use libloading::{Library, Symbol};

use super::manifest::{PluginManifest, MANIFEST_FILE};
use crate::application::errors::PluginError;
use crate::application::plugins::Generation;
use crate::domain::traits::Extension;

/// Symbol every native plugin exports
pub const ENTRY_SYMBOL: &[u8] = b"carik_plugin_entry";

/// Function signature of the plugin entry point
pub type ExtensionEntryFn = unsafe extern "C" fn() -> *mut Box<dyn Extension>;

/// Export a native plugin's entry point.
///
/// ```ignore
/// carik_hub::declare_extension!(Dice::default());
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn carik_plugin_entry() -> *mut ::std::boxed::Box<dyn $crate::domain::traits::Extension> {
            let extension: ::std::boxed::Box<dyn $crate::domain::traits::Extension> = ::std::boxed::Box::new($ctor);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(extension))
        }
    };
}

/// One instantiated generation of a plugin module
pub struct LoadedModule {
    // Dropped before the library that holds its code
    extension: Arc<dyn Extension>,
    manifest: Option<PluginManifest>,
    library: Option<Library>,
    shadow: Option<PathBuf>,
}

impl LoadedModule {
    /// Module backed by an in-process value
    pub fn in_process(extension: Arc<dyn Extension>) -> Self {
        Self {
            extension,
            manifest: None,
            library: None,
            shadow: None,
        }
    }

    pub fn with_manifest(mut self, manifest: PluginManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn extension(&self) -> Arc<dyn Extension> {
        Arc::clone(&self.extension)
    }

    pub fn manifest(&self) -> Option<&PluginManifest> {
        self.manifest.as_ref()
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        if let Some(shadow) = self.shadow.take() {
            if let Err(e) = std::fs::remove_file(&shadow) {
                tracing::debug!("Failed to remove shadow library {}: {}", shadow.display(), e);
            }
        }
    }
}

/// Turns a resolved plugin location into a live module
pub trait ModuleLoader: Send + Sync {
    fn load(&self, name: &str, location: &Path, generation: Generation) -> Result<LoadedModule, PluginError>;
}

/// Loads native plugins through `libloading`.
///
/// The library is copied to a generation-stamped shadow file before it is
/// opened, so every generation maps the bytes currently on disk even if the
/// dynamic linker still caches an older mapping of the original path.
pub struct LibraryLoader {
    shadow_dir: PathBuf,
}

impl LibraryLoader {
    pub fn new(shadow_dir: impl Into<PathBuf>) -> Self {
        Self {
            shadow_dir: shadow_dir.into(),
        }
    }

    fn shadow_path(&self, name: &str, generation: Generation) -> PathBuf {
        self.shadow_dir
            .join(format!("{}-g{}{}", name, generation.0, std::env::consts::DLL_SUFFIX))
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("carik-hub").join("shadow"))
    }
}

impl ModuleLoader for LibraryLoader {
    fn load(&self, name: &str, location: &Path, generation: Generation) -> Result<LoadedModule, PluginError> {
        let invalid = |reason: String| PluginError::InvalidPlugin {
            name: name.to_string(),
            reason,
        };

        let manifest_path = location.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(invalid(format!("Missing {} in {}", MANIFEST_FILE, location.display())));
        }
        let manifest = PluginManifest::from_file(&manifest_path)?;

        let library_path = manifest.library_path(location);
        if !library_path.exists() {
            return Err(invalid(format!("Library not found: {}", library_path.display())));
        }

        let shadow = self.shadow_path(name, generation);
        std::fs::create_dir_all(&self.shadow_dir)
            .and_then(|_| std::fs::copy(&library_path, &shadow))
            .map_err(|e| invalid(format!("Failed to stage library: {}", e)))?;

        // From here on the shadow copy is cleaned up by LoadedModule's Drop
        let mut module = LoadedModule {
            extension: Arc::new(Unloaded),
            manifest: Some(manifest),
            library: None,
            shadow: Some(shadow.clone()),
        };

        // SAFETY: loading foreign code is inherently unsafe; plugins are trusted by the operator.
        let library = unsafe {
            Library::new(&shadow).map_err(|e| invalid(format!("Failed to load library: {}", e)))?
        };

        let extension = unsafe {
            let entry: Symbol<ExtensionEntryFn> = library
                .get(ENTRY_SYMBOL)
                .map_err(|e| invalid(format!("Failed to find entry point: {}", e)))?;

            let raw = entry();
            if raw.is_null() {
                return Err(invalid("Plugin entry returned null".to_string()));
            }
            // SAFETY: the pointer was produced by Box::into_raw in declare_extension!
            Arc::<dyn Extension>::from(*Box::from_raw(raw))
        };

        module.extension = extension;
        module.library = Some(library);

        if let Some(m) = module.manifest() {
            tracing::info!("Loaded plugin: {} v{} ({})", m.name, m.version, generation);
        }
        Ok(module)
    }
}

/// Placeholder extension used while a native module is being assembled
struct Unloaded;

impl Extension for Unloaded {}

/// Factory producing a fresh extension value per generation
pub type ExtensionFactory = Arc<dyn Fn() -> Arc<dyn Extension> + Send + Sync>;

/// Extensions linked into the host binary, registered by name.
///
/// Names not registered here are handed to the fallback loader, if any.
pub struct StaticLoader {
    factories: RwLock<HashMap<String, ExtensionFactory>>,
    fallback: Option<Arc<dyn ModuleLoader>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ModuleLoader>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Register an extension under `name`
    pub fn register<F, E>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: Extension + 'static,
    {
        let factory: ExtensionFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn Extension>);
        self.factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), factory);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }
}

impl Default for StaticLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for StaticLoader {
    fn load(&self, name: &str, location: &Path, generation: Generation) -> Result<LoadedModule, PluginError> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned();

        match (factory, &self.fallback) {
            (Some(factory), _) => {
                let mut module = LoadedModule::in_process(factory());
                let manifest_path = location.join(MANIFEST_FILE);
                if manifest_path.exists() {
                    module = module.with_manifest(PluginManifest::from_file(&manifest_path)?);
                }
                tracing::info!("Instantiated built-in plugin: {} ({})", name, generation);
                Ok(module)
            }
            (None, Some(fallback)) => fallback.load(name, location, generation),
            (None, None) => Err(PluginError::InvalidPlugin {
                name: name.to_string(),
                reason: "no extension registered under this name".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Noop;
    impl Extension for Noop {}

    #[test]
    fn static_loader_builds_fresh_values() {
        let built = Arc::new(AtomicUsize::new(0));
        let loader = StaticLoader::new();
        let counter = Arc::clone(&built);
        loader.register("noop", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Noop
        });

        let dir = tempfile::tempdir().unwrap();
        loader.load("noop", dir.path(), Generation(1)).unwrap();
        loader.load("noop", dir.path(), Generation(2)).unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_names_are_invalid() {
        let loader = StaticLoader::new();
        let dir = tempfile::tempdir().unwrap();
        let err = loader.load("ghost", dir.path(), Generation(1)).err().unwrap();
        assert!(matches!(err, PluginError::InvalidPlugin { .. }));
    }

    #[test]
    fn library_loader_requires_manifest_and_library() {
        let dir = tempfile::tempdir().unwrap();
        let shadow = tempfile::tempdir().unwrap();
        let loader = LibraryLoader::new(shadow.path());

        let err = loader.load("dice", dir.path(), Generation(1)).err().unwrap();
        assert!(err.to_string().contains("Missing plugin.yaml"));

        std::fs::write(dir.path().join(MANIFEST_FILE), "name: dice\nversion: 0.1.0\n").unwrap();
        let err = loader.load("dice", dir.path(), Generation(1)).err().unwrap();
        assert!(err.to_string().contains("Library not found"));
    }

    #[test]
    fn library_loader_rejects_garbage_and_cleans_shadow() {
        let dir = tempfile::tempdir().unwrap();
        let shadow = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "name: dice\nversion: 0.1.0\nlibrary: dice.bin\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("dice.bin"), b"not a library").unwrap();

        let loader = LibraryLoader::new(shadow.path());
        let err = loader.load("dice", dir.path(), Generation(3)).err().unwrap();
        assert!(matches!(err, PluginError::InvalidPlugin { .. }));
        assert_eq!(std::fs::read_dir(shadow.path()).unwrap().count(), 0);
    }
}
