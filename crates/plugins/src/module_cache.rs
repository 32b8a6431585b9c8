//! Module cache: canonical source path → evaluated module.
//!
//! This is the explicit model of the host runtime's import cache. A
//! plugin whose file changed on disk keeps resolving to the stale module
//! until its path is purged — reload purges exactly the previous
//! generation's source paths so the next load pass re-evaluates them.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
};

use tracing::debug;

use crate::module::LoadedModule;

/// Key-value store from canonical source path to loaded module, with
/// get-or-load and purge-by-path-set as the only operations.
pub struct ModuleCache {
    entries: Mutex<HashMap<PathBuf, Arc<LoadedModule>>>,
}

static GLOBAL: OnceLock<ModuleCache> = OnceLock::new();

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache used by the loader.
    pub fn global() -> &'static ModuleCache {
        GLOBAL.get_or_init(ModuleCache::new)
    }

    fn canonical(path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    /// Return the resident module for `source`, or evaluate it via
    /// `load` and make it resident.
    pub async fn get_or_load<F, Fut>(
        &self,
        source: &Path,
        load: F,
    ) -> anyhow::Result<Arc<LoadedModule>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<LoadedModule>>>,
    {
        let key = Self::canonical(source);
        {
            let entries = self.entries.lock().unwrap();
            if let Some(module) = entries.get(&key) {
                debug!(source = %key.display(), "module cache hit");
                return Ok(module.clone());
            }
        }

        let module = load().await?;
        self.entries.lock().unwrap().insert(key, module.clone());
        Ok(module)
    }

    /// Remove the entries for the given source paths. Paths not resident
    /// are ignored. Returns the number of entries removed.
    pub fn purge(&self, sources: &[PathBuf]) -> usize {
        let targets: HashSet<PathBuf> = sources.iter().map(|p| Self::canonical(p)).collect();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !targets.contains(key));
        before - entries.len()
    }

    /// Whether a module for `source` is currently resident.
    pub fn contains(&self, source: &Path) -> bool {
        self.entries
            .lock()
            .unwrap()
            .contains_key(&Self::canonical(source))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
