//! Plugin discovery and loading
//! 
//! A plugin is a directory holding a `plugin.yaml` manifest and a shared
//! library that exports `carik_plugin_entry` (see [`declare_extension!`](crate::declare_extension)).
//! Plugins are searched in the local plugins directory first, then in the
//! shared modules directory.

pub mod loader;
pub mod manifest;
pub mod resolver;

pub use loader::{ExtensionFactory, LibraryLoader, LoadedModule, ModuleLoader, StaticLoader, ENTRY_SYMBOL};
pub use manifest::{PluginManifest, MANIFEST_FILE};
pub use resolver::{DiscoveredPlugin, PluginOrigin, PluginResolver, MODULE_PREFIX};
