//! The plugin registry snapshot and the process-wide active pointer.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use crate::api::{GatewayFn, HookFn};

/// Load status of one plugin within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Loaded,
    Error,
    Disabled,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Error => "error",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One loaded (or failed, or disabled) plugin. Immutable once placed
/// into a registry.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub id: String,
    pub root: PathBuf,
    /// Canonical manifest path — the module-cache key for this plugin.
    pub source: PathBuf,
    pub status: PluginStatus,
    pub error: Option<String>,
    pub hook_events: Vec<String>,
    pub command_names: Vec<String>,
    pub gateway_methods: Vec<String>,
}

/// A resolved hook: event name, owning plugin, handler.
#[derive(Clone)]
pub struct HookDescriptor {
    pub event: String,
    pub plugin_id: String,
    pub handler: HookFn,
}

/// A gateway method binding. `plugin_id` is None for host-provided core
/// handlers.
#[derive(Clone)]
pub struct GatewayBinding {
    pub plugin_id: Option<String>,
    pub handler: GatewayFn,
}

/// A plugin gateway method that collided with an existing binding and
/// was therefore not installed.
#[derive(Debug, Clone)]
pub struct GatewayConflict {
    pub method: String,
    pub plugin_id: String,
    /// Owner of the surviving binding; None means a core handler.
    pub existing: Option<String>,
}

/// Immutable snapshot of the loaded plugin set.
///
/// Never mutated after construction: reload assembles a new registry and
/// swaps the active pointer, so holders of a superseded Arc keep a
/// consistent, frozen view until they drop it.
pub struct PluginRegistry {
    pub plugins: Vec<PluginRecord>,
    pub hooks: Vec<HookDescriptor>,
    pub gateway: HashMap<String, GatewayBinding>,
    pub gateway_conflicts: Vec<GatewayConflict>,
}

impl PluginRegistry {
    /// Plugins with status `loaded`.
    pub fn loaded_count(&self) -> usize {
        self.plugins
            .iter()
            .filter(|p| p.status == PluginStatus::Loaded)
            .count()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn get(&self, id: &str) -> Option<&PluginRecord> {
        self.plugins.iter().find(|p| p.id == id)
    }

    /// Source paths of every loaded plugin — the exact set the module
    /// cache buster purges on the next reload.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.plugins
            .iter()
            .filter(|p| p.status == PluginStatus::Loaded)
            .map(|p| p.source.clone())
            .collect()
    }
}

// ── Active registry singleton ────────────────────────────────────────────────

static ACTIVE: RwLock<Option<Arc<PluginRegistry>>> = RwLock::new(None);

/// The currently live registry, if any load has succeeded yet.
///
/// Readers get an Arc to a fully assembled, immutable snapshot; a
/// concurrent reload never mutates it, only replaces the pointer.
pub fn active() -> Option<Arc<PluginRegistry>> {
    ACTIVE.read().unwrap().clone()
}

/// Atomically replace the live registry.
///
/// Called on host startup after the first successful load, and by the
/// reload orchestrator on success. Nothing else writes here; a failed
/// reload leaves the previous value in place.
pub fn publish(registry: Arc<PluginRegistry>) {
    *ACTIVE.write().unwrap() = Some(registry);
}

#[cfg(test)]
pub(crate) fn reset_active() {
    *ACTIVE.write().unwrap() = None;
}
