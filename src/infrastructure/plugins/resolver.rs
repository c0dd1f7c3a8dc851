//! Plugin resolver - finds plugin directories by name

use std::path::{Path, PathBuf};

use tokio::fs;

use super::manifest::MANIFEST_FILE;
use crate::application::errors::PluginError;

/// Conventional prefix of plugins published to the shared modules directory
pub const MODULE_PREFIX: &str = "carik-plugin-";

/// Where a discoverable plugin lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginOrigin {
    /// The local plugins directory
    Local,
    /// The shared modules directory
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    /// Name to load the plugin by, prefix stripped
    pub name: String,
    pub origin: PluginOrigin,
    pub path: PathBuf,
}

/// Searches the local plugins directory, then the shared modules directory
#[derive(Debug, Clone)]
pub struct PluginResolver {
    plugins_dir: PathBuf,
    modules_dir: PathBuf,
}

impl PluginResolver {
    pub fn new(plugins_dir: impl Into<PathBuf>, modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            modules_dir: modules_dir.into(),
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Resolve `name` to a plugin directory
    pub async fn resolve(&self, name: &str) -> Result<PathBuf, PluginError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(PluginError::NotFound(name.to_string()));
        }

        // A subdirectory or a link in the local plugins directory
        for (entry, is_dir_or_link) in list_dir(&self.plugins_dir, true).await {
            if is_dir_or_link && entry.file_name().and_then(|n| n.to_str()) == Some(name) {
                return Ok(entry);
            }
        }

        let prefixed = format!("{}{}", MODULE_PREFIX, name);
        for (entry, is_dir) in list_dir(&self.modules_dir, false).await {
            let file_name = entry.file_name().and_then(|n| n.to_str());
            if is_dir && (file_name == Some(name) || file_name == Some(prefixed.as_str())) {
                return Ok(entry);
            }
        }

        Err(PluginError::NotFound(name.to_string()))
    }

    /// Every entry in either location that carries a manifest
    pub async fn discover(&self) -> Vec<DiscoveredPlugin> {
        let mut found = Vec::new();

        for (path, is_dir_or_link) in list_dir(&self.plugins_dir, true).await {
            if !is_dir_or_link || !path.join(MANIFEST_FILE).exists() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                found.push(DiscoveredPlugin {
                    name: name.to_string(),
                    origin: PluginOrigin::Local,
                    path: path.clone(),
                });
            }
        }

        for (path, is_dir) in list_dir(&self.modules_dir, false).await {
            if !is_dir || !path.join(MANIFEST_FILE).exists() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if let Some(name) = file_name.strip_prefix(MODULE_PREFIX) {
                found.push(DiscoveredPlugin {
                    name: name.to_string(),
                    origin: PluginOrigin::Shared,
                    path: path.clone(),
                });
            }
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}

/// Entries of `dir` paired with "is a directory" (or "is a link" when `links` is set).
/// A missing directory is created empty.
async fn list_dir(dir: &Path, links: bool) -> Vec<(PathBuf, bool)> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Err(e) = fs::create_dir_all(dir).await {
                tracing::warn!("Failed to create {}: {}", dir.display(), e);
            }
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                let matches = match entry.file_type().await {
                    Ok(t) => t.is_dir() || (links && t.is_symlink()),
                    Err(_) => false,
                };
                entries.push((entry.path(), matches));
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read directory entry: {}", e);
                break;
            }
        }
    }
    entries.sort();
    entries
}
