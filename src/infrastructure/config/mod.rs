//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::application::errors::ConfigError;
use crate::domain::entities::{InstanceId, UserId};
use crate::infrastructure::storage::write_atomic;

/// Accepted protocol platforms
pub const PLATFORMS: [u8; 5] = [1, 2, 3, 4, 5];

/// Accepted log levels of the protocol client
pub const LOG_LEVELS: [&str; 8] = ["trace", "debug", "info", "warn", "error", "fatal", "mark", "off"];

/// Host configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub port: u16,
    pub plugins_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub bots: BTreeMap<InstanceId, BotConfig>,
}

/// Per-instance settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    #[serde(default)]
    pub masters: Vec<UserId>,
    #[serde(default = "default_true")]
    pub auto_login: bool,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_platform")]
    pub platform: u8,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    ">".to_string()
}

fn default_platform() -> u8 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BotConfig {
    pub fn new(master: UserId) -> Self {
        Self {
            masters: vec![master],
            ..Self::default()
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            masters: Vec::new(),
            auto_login: true,
            prefix: default_prefix(),
            platform: default_platform(),
            log_level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 2333,
            plugins_dir: PathBuf::from("./plugins"),
            modules_dir: PathBuf::from("./modules"),
            data_dir: PathBuf::from("./data"),
            bots: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, bot) in &self.bots {
            if bot.prefix.is_empty() {
                return Err(ConfigError::MissingField(format!("bots.{}.prefix", id)));
            }
            if !PLATFORMS.contains(&bot.platform) {
                return Err(ConfigError::InvalidValue(format!("bots.{}.platform = {}", id, bot.platform)));
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Working directory of one instance
    pub fn instance_dir(&self, id: InstanceId) -> PathBuf {
        self.data_dir.join(id.to_string())
    }
}

/// Shared, persisted configuration.
///
/// Every mutation is applied to a copy, written with write-then-rename and
/// only then made visible.
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<Config>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(config),
        }
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = if path.exists() {
            Config::load(&path)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Config::default()
        };
        Ok(Self::new(path, config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    pub async fn bot(&self, id: InstanceId) -> Option<BotConfig> {
        self.config.read().await.bots.get(&id).cloned()
    }

    pub async fn instance_dir(&self, id: InstanceId) -> PathBuf {
        self.config.read().await.instance_dir(id)
    }

    /// Apply `f` to a copy, persist it, then publish it
    pub async fn update<T>(&self, f: impl FnOnce(&mut Config) -> Result<T, ConfigError>) -> Result<T, ConfigError> {
        let mut guard = self.config.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_atomic(&self.path, next.to_yaml()?.as_bytes()).await?;
        *guard = next;
        Ok(out)
    }

    async fn update_bot<T>(
        &self,
        id: InstanceId,
        f: impl FnOnce(&mut BotConfig) -> Result<T, ConfigError>,
    ) -> Result<T, ConfigError> {
        self.update(|config| {
            let bot = config
                .bots
                .get_mut(&id)
                .ok_or_else(|| ConfigError::MissingField(format!("bots.{}", id)))?;
            f(bot)
        })
        .await
    }

    /// Register a new bot with `master` as its only master
    pub async fn add_bot(&self, id: InstanceId, master: UserId) -> Result<(), ConfigError> {
        self.update(|config| {
            config.bots.insert(id, BotConfig::new(master));
            Ok(())
        })
        .await
    }

    pub async fn set_auto_login(&self, id: InstanceId, enabled: bool) -> Result<(), ConfigError> {
        self.update_bot(id, |bot| {
            bot.auto_login = enabled;
            Ok(())
        })
        .await
    }

    /// Returns the resulting masters list
    pub async fn add_master(&self, id: InstanceId, master: UserId) -> Result<Vec<UserId>, ConfigError> {
        self.update_bot(id, |bot| {
            if !bot.masters.contains(&master) {
                bot.masters.push(master);
            }
            Ok(bot.masters.clone())
        })
        .await
    }

    /// Returns the resulting masters list
    pub async fn remove_master(&self, id: InstanceId, master: UserId) -> Result<Vec<UserId>, ConfigError> {
        self.update_bot(id, |bot| {
            if !bot.masters.contains(&master) {
                return Err(ConfigError::InvalidValue(format!("{} is not a master", master)));
            }
            bot.masters.retain(|m| *m != master);
            Ok(bot.masters.clone())
        })
        .await
    }

    /// Returns the previous prefix
    pub async fn set_prefix(&self, id: InstanceId, prefix: &str) -> Result<String, ConfigError> {
        if prefix.is_empty() {
            return Err(ConfigError::InvalidValue("prefix needs at least one character".to_string()));
        }
        self.update_bot(id, |bot| Ok(std::mem::replace(&mut bot.prefix, prefix.to_string())))
            .await
    }

    /// Returns the previous platform
    pub async fn set_platform(&self, id: InstanceId, platform: u8) -> Result<u8, ConfigError> {
        if !PLATFORMS.contains(&platform) {
            return Err(ConfigError::InvalidValue(format!("platform must be one of {:?}", PLATFORMS)));
        }
        self.update_bot(id, |bot| Ok(std::mem::replace(&mut bot.platform, platform)))
            .await
    }

    /// Returns the previous log level
    pub async fn set_log_level(&self, id: InstanceId, level: &str) -> Result<String, ConfigError> {
        if !LOG_LEVELS.contains(&level) {
            return Err(ConfigError::InvalidValue(format!("log level must be one of {:?}", LOG_LEVELS)));
        }
        self.update_bot(id, |bot| Ok(std::mem::replace(&mut bot.log_level, level.to_string())))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
port: 2333
plugins-dir: ./plugins
modules-dir: ./modules
data-dir: ./data
bots:
  10001:
    masters: [42]
    prefix: "!"
"#;

    #[test]
    fn parses_with_defaults() {
        let config = Config::parse(SAMPLE).unwrap();
        let bot = &config.bots[&InstanceId(10001)];
        assert_eq!(bot.masters, vec![42]);
        assert_eq!(bot.prefix, "!");
        assert!(bot.auto_login);
        assert_eq!(bot.platform, 5);
        assert_eq!(config.instance_dir(InstanceId(10001)), PathBuf::from("./data/10001"));
    }

    #[test]
    fn rejects_bad_platform() {
        let bad = SAMPLE.replace("prefix: \"!\"", "platform: 9");
        assert!(matches!(Config::parse(&bad), Err(ConfigError::InvalidValue(_))));
    }

    #[tokio::test]
    async fn mutations_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carik.yaml");
        let store = ConfigStore::new(&path, Config::parse(SAMPLE).unwrap());
        let id = InstanceId(10001);

        assert_eq!(store.add_master(id, 7).await.unwrap(), vec![42, 7]);
        assert_eq!(store.set_prefix(id, "#").await.unwrap(), "!");
        store.set_auto_login(id, false).await.unwrap();

        let reloaded = Config::load(&path).unwrap();
        let bot = &reloaded.bots[&id];
        assert_eq!(bot.masters, vec![42, 7]);
        assert_eq!(bot.prefix, "#");
        assert!(!bot.auto_login);
    }

    #[tokio::test]
    async fn invalid_changes_leave_config_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("carik.yaml"), Config::parse(SAMPLE).unwrap());
        let id = InstanceId(10001);

        assert!(store.set_prefix(id, "").await.is_err());
        assert!(store.set_platform(id, 0).await.is_err());
        assert!(store.set_log_level(id, "loud").await.is_err());
        assert!(store.remove_master(id, 99).await.is_err());
        assert!(store.set_auto_login(InstanceId(1), true).await.is_err());

        assert_eq!(store.bot(id).await.unwrap().prefix, "!");
        assert!(!dir.path().join("carik.yaml").exists());
    }
}
