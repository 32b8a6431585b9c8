use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KestrelConfig {
    pub plugins: PluginsConfig,
}

/// Plugin subsystem configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Extra directories searched for plugins, in addition to the
    /// workspace-local `plugins/` directory and the bundled directory.
    pub load_paths: Vec<PathBuf>,

    /// Per-plugin settings keyed by plugin id.
    pub entries: HashMap<String, PluginEntry>,
}

/// Configuration for a single plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginEntry {
    /// Whether this plugin is enabled. Defaults to true.
    pub enabled: bool,

    /// Plugin-specific settings, checked against the plugin's declared
    /// config schema at load time.
    pub config: Option<serde_json::Value>,
}

impl Default for PluginEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            config: None,
        }
    }
}

impl PluginsConfig {
    /// Check if a plugin is enabled (defaults to true if not configured).
    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries.get(id).map_or(true, |e| e.enabled)
    }

    /// Get the configured entry for a plugin, if any.
    pub fn get(&self, id: &str) -> Option<&PluginEntry> {
        self.entries.get(id)
    }
}
