//! Plugin manifest definition

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::errors::PluginError;

/// File name of the manifest inside a plugin directory
pub const MANIFEST_FILE: &str = "plugin.yaml";

/// Plugin metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginManifest {
    /// Plugin name (required)
    pub name: String,
    
    /// Plugin version (required)
    pub version: String,
    
    /// Plugin description
    #[serde(default)]
    pub description: Option<String>,
    
    /// Plugin author
    #[serde(default)]
    pub author: Option<String>,
    
    /// Path to the shared library, relative to the plugin directory
    #[serde(default)]
    pub library: Option<PathBuf>,
}

impl PluginManifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PluginError> {
        let path = path.as_ref();
        let invalid = |reason: String| PluginError::InvalidPlugin {
            name: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("Failed to read manifest: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| invalid(format!("Failed to parse manifest: {}", e)))
    }

    /// Shared library inside `dir`; defaults to `carik_plugin_<name>` with the platform's naming
    pub fn library_path(&self, dir: &Path) -> PathBuf {
        match &self.library {
            Some(lib) => dir.join(lib),
            None => dir.join(format!(
                "{}carik_plugin_{}{}",
                std::env::consts::DLL_PREFIX,
                self.name.replace('-', "_"),
                std::env::consts::DLL_SUFFIX
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let manifest: PluginManifest = serde_yaml::from_str("name: dice\nversion: 0.2.0\n").unwrap();
        assert_eq!(manifest.name, "dice");
        assert!(manifest.library.is_none());

        let lib = manifest.library_path(Path::new("/p"));
        let file = lib.file_name().unwrap().to_string_lossy().to_string();
        assert!(file.contains("carik_plugin_dice"));
    }

    #[test]
    fn explicit_library_wins() {
        let manifest: PluginManifest =
            serde_yaml::from_str("name: dice\nversion: 1.0.0\nlibrary: build/dice.so\n").unwrap();
        assert_eq!(manifest.library_path(Path::new("/p")), PathBuf::from("/p/build/dice.so"));
    }
}
