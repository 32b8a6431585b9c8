//! Plugin candidate discovery.
//!
//! Side-effect-free filesystem probing over the configured search roots.
//! Ordering is deterministic (lexicographic by root path) so repeated
//! passes over an unchanged tree behave identically.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use kestrel_config::schema::PluginsConfig;

use crate::manifest::MANIFEST_FILENAME;

/// Environment override for the bundled plugins directory.
pub const BUNDLED_DIR_ENV: &str = "KESTREL_BUNDLED_PLUGINS_DIR";

/// A discovered plugin root, produced per load pass and not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCandidate {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
}

/// Enumerate plugin candidates from the workspace, the bundled directory,
/// and the configured extra load paths.
///
/// Nonexistent or unreadable roots contribute nothing; they never fail
/// the pass.
pub fn discover(workspace_dir: Option<&Path>, config: &PluginsConfig) -> Vec<PluginCandidate> {
    let mut roots: Vec<PathBuf> = Vec::new();
    if let Some(ws) = workspace_dir {
        roots.push(ws.join("plugins"));
    }
    if let Some(bundled) = bundled_dir() {
        roots.push(bundled);
    }
    roots.extend(config.load_paths.iter().cloned());

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for root in &roots {
        collect(root, &mut seen, &mut candidates);
    }
    candidates.sort_by(|a, b| a.root.cmp(&b.root));
    candidates
}

/// Bundled plugins directory: env override, else `extensions/` next to
/// the running executable.
fn bundled_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(BUNDLED_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("extensions")))
}

/// A root either is a plugin directory itself or contains plugin
/// directories one level down.
fn collect(root: &Path, seen: &mut HashSet<PathBuf>, out: &mut Vec<PluginCandidate>) {
    if !root.is_dir() {
        return;
    }

    let direct = root.join(MANIFEST_FILENAME);
    if direct.is_file() {
        push_candidate(root.to_path_buf(), direct, seen, out);
        return;
    }

    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        let manifest = dir.join(MANIFEST_FILENAME);
        if dir.is_dir() && manifest.is_file() {
            push_candidate(dir, manifest, seen, out);
        }
    }
}

fn push_candidate(
    root: PathBuf,
    manifest_path: PathBuf,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<PluginCandidate>,
) {
    let key = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
    if seen.insert(key) {
        out.push(PluginCandidate {
            root,
            manifest_path,
        });
    }
}
