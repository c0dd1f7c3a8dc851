use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::GroupId;

/// Per-group settings of one plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSetting {
    /// Locked settings can only be changed by a master
    pub lock: bool,
    /// Whether the plugin answers in this group
    pub switch: bool,
    /// Plugin-defined parameters
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Default for PluginSetting {
    fn default() -> Self {
        Self {
            lock: false,
            switch: true,
            params: serde_json::Map::new(),
        }
    }
}

/// Plugin settings of one group conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub setting: BTreeMap<String, PluginSetting>,
}

/// Which plugins an instance has enabled, plus per-group overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingRecord {
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub groups: BTreeMap<GroupId, GroupSettings>,
}

impl BindingRecord {
    pub fn contains(&self, plugin: &str) -> bool {
        self.plugins.iter().any(|p| p == plugin)
    }

    /// Add a plugin name, keeping insertion order. Returns false if present.
    pub fn insert(&mut self, plugin: &str) -> bool {
        if self.contains(plugin) {
            return false;
        }
        self.plugins.push(plugin.to_string());
        true
    }

    /// Returns false if the plugin was not listed
    pub fn remove(&mut self, plugin: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p != plugin);
        self.plugins.len() != before
    }

    pub fn group(&self, group_id: GroupId) -> Option<&GroupSettings> {
        self.groups.get(&group_id)
    }

    pub fn group_mut(&mut self, group_id: GroupId) -> &mut GroupSettings {
        self.groups.entry(group_id).or_default()
    }
}
