//! Process-wide registry of plugin-provided user commands.

use std::{
    collections::HashMap,
    sync::{Mutex, OnceLock},
};

use tracing::warn;

use crate::api::CommandFn;

/// A command as registered by a plugin.
#[derive(Clone)]
pub struct RegisteredCommand {
    pub plugin_id: String,
    pub description: Option<String>,
    pub handler: CommandFn,
}

/// Name → command map. Populated by the loader as plugins load; cleared
/// by the reload orchestrator before every reload so stale or duplicate
/// entries cannot survive a generation change.
pub struct CommandRegistry {
    commands: Mutex<HashMap<String, RegisteredCommand>>,
}

static GLOBAL: OnceLock<CommandRegistry> = OnceLock::new();

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static CommandRegistry {
        GLOBAL.get_or_init(CommandRegistry::new)
    }

    /// Register a command. The first registration of a name wins;
    /// later ones are rejected with a warning.
    pub fn register(&self, name: impl Into<String>, command: RegisteredCommand) -> bool {
        let name = name.into();
        let mut commands = self.commands.lock().unwrap();
        if let Some(existing) = commands.get(&name) {
            warn!(
                command = %name,
                plugin = %command.plugin_id,
                existing = %existing.plugin_id,
                "command name already registered, keeping first"
            );
            return false;
        }
        commands.insert(name, command);
        true
    }

    pub fn get(&self, name: &str) -> Option<RegisteredCommand> {
        self.commands.lock().unwrap().get(name).cloned()
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.commands.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all registered commands. Idempotent.
    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }
}
