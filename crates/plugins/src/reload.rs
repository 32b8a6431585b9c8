//! Hot reload: rediscover plugin sources, drop every cache layer, load
//! fresh, and atomically publish the new registry.
//!
//! The central correctness property: a failed reload leaves the
//! previously published registry active — the host never ends up with
//! no registry, or a half-built one. In-flight work holding the old
//! Arc keeps a consistent snapshot either way.
//!
//! Callers serialize reload triggers themselves (e.g. one signal
//! handler); this module assumes, and does not enforce, non-overlap.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{error, info};

use crate::{
    commands::CommandRegistry,
    discovery,
    hooks::HookRunner,
    loader::{self, ClearCacheOptions, LoadParams},
    registry::{self, PluginRegistry},
};

/// Outcome of one reload pass.
#[derive(Clone)]
pub enum ReloadOutcome {
    /// The new registry was published.
    Reloaded {
        registry: Arc<PluginRegistry>,
        /// Plugins with status `loaded`.
        plugins: usize,
        /// Length of the new registry's hook sequence.
        hooks: usize,
        duration: Duration,
    },
    /// The pass failed; the previously active registry is untouched.
    Failed { error: String, duration: Duration },
}

impl ReloadOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Reloaded { .. })
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Reloaded { duration, .. } | Self::Failed { duration, .. } => *duration,
        }
    }
}

/// Reload the entire plugin set.
///
/// Discover → clear caches (loader cache, module cache for the previous
/// generation's sources, command registry, hook runner) → fresh load →
/// publish. Every failure in between is folded into
/// [`ReloadOutcome::Failed`] without touching the active registry.
pub async fn reload_plugins(params: &LoadParams) -> ReloadOutcome {
    let started = Instant::now();
    info!("plugin reload started");

    match run_reload(params).await {
        Ok(registry) => {
            let plugins = registry.loaded_count();
            let hooks = registry.hook_count();
            let duration = started.elapsed();
            info!(
                plugins,
                hooks,
                duration_ms = duration.as_millis() as u64,
                "plugin reload complete"
            );
            ReloadOutcome::Reloaded {
                registry,
                plugins,
                hooks,
                duration,
            }
        },
        Err(e) => {
            let duration = started.elapsed();
            error!(
                error = %e,
                duration_ms = duration.as_millis() as u64,
                "plugin reload failed, previous registry kept"
            );
            ReloadOutcome::Failed {
                error: e.to_string(),
                duration,
            }
        },
    }
}

async fn run_reload(params: &LoadParams) -> anyhow::Result<Arc<PluginRegistry>> {
    // Rediscover first so cache busting targets the files the fresh
    // pass is about to import.
    let candidates = discovery::discover(params.workspace_dir.as_deref(), &params.config.plugins);

    // The previous generation's recorded sources are the precise bust
    // set; before any generation exists, fall back to the candidates'
    // manifests.
    let sources = match registry::active() {
        Some(previous) => previous.source_paths(),
        None => candidates.iter().map(|c| c.manifest_path.clone()).collect(),
    };

    loader::clear_caches(&ClearCacheOptions {
        plugin_source_paths: Some(sources),
    });
    CommandRegistry::global().clear();
    HookRunner::global().reset();
    info!("plugin caches cleared");

    let mut fresh = params.clone();
    fresh.cache = false;
    let registry = loader::load(&fresh).await?;

    // Single atomic publish; everything before this line left the
    // active registry alone.
    registry::publish(registry.clone());
    Ok(registry)
}

/// Thinner reload entry point: purge the previous generation's modules,
/// drop the loader cache, force a fresh load, publish.
///
/// Same primitives as [`reload_plugins`] without the outcome wrapper —
/// errors propagate, and on error the active registry is untouched.
pub async fn refresh_plugins(params: &LoadParams) -> anyhow::Result<Arc<PluginRegistry>> {
    let sources = registry::active().map(|previous| previous.source_paths());
    loader::clear_caches(&ClearCacheOptions {
        plugin_source_paths: sources,
    });
    CommandRegistry::global().clear();
    HookRunner::global().reset();

    let mut fresh = params.clone();
    fresh.cache = false;
    let registry = loader::load(&fresh).await?;
    registry::publish(registry.clone());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serial_test::serial;

    use super::*;
    use crate::{
        manifest::PluginManifest,
        module::{LoadedModule, ModuleLoader},
    };
    use async_trait::async_trait;
    use kestrel_config::KestrelConfig;

    fn write_plugin(plugins_dir: &Path, id: &str, body: &str) {
        let root = plugins_dir.join(id);
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("plugin.toml"), format!("id = \"{id}\"\n{body}")).unwrap();
    }

    fn workspace_params(ws: &Path) -> LoadParams {
        let mut params = LoadParams::new(KestrelConfig::default());
        params.workspace_dir = Some(ws.to_path_buf());
        params
    }

    struct BrokenRuntime;

    #[async_trait]
    impl ModuleLoader for BrokenRuntime {
        fn preflight(&self) -> anyhow::Result<()> {
            anyhow::bail!("plugin runtime unavailable")
        }

        async fn load(
            &self,
            _root: &Path,
            _manifest: &PluginManifest,
        ) -> anyhow::Result<Arc<LoadedModule>> {
            anyhow::bail!("unreachable")
        }
    }

    #[tokio::test]
    #[serial]
    async fn reload_of_minimal_plugin_workspace() {
        registry::reset_active();
        let ws = tempfile::tempdir().unwrap();
        write_plugin(&ws.path().join("plugins"), "solo", "\n[config]\n");

        let outcome = reload_plugins(&workspace_params(ws.path())).await;
        match outcome {
            ReloadOutcome::Reloaded {
                plugins, hooks, ..
            } => {
                assert_eq!(plugins, 1);
                assert_eq!(hooks, 0);
            },
            ReloadOutcome::Failed { error, .. } => panic!("reload failed: {error}"),
        }
    }

    #[tokio::test]
    #[serial]
    async fn reload_tolerates_nonexistent_workspace() {
        registry::reset_active();
        let params = workspace_params(Path::new("/no/such/workspace"));
        let outcome = reload_plugins(&params).await;
        assert!(outcome.is_ok());
        if let ReloadOutcome::Reloaded {
            plugins, hooks, ..
        } = outcome
        {
            assert_eq!(plugins, 0);
            assert_eq!(hooks, 0);
        }
    }

    #[tokio::test]
    #[serial]
    async fn successful_reload_publishes_a_new_generation() {
        registry::reset_active();
        let ws = tempfile::tempdir().unwrap();
        write_plugin(&ws.path().join("plugins"), "gen", "");
        let params = workspace_params(ws.path());

        let first = match reload_plugins(&params).await {
            ReloadOutcome::Reloaded { registry, .. } => registry,
            ReloadOutcome::Failed { error, .. } => panic!("reload failed: {error}"),
        };
        assert!(Arc::ptr_eq(&registry::active().unwrap(), &first));

        let second = match reload_plugins(&params).await {
            ReloadOutcome::Reloaded { registry, .. } => registry,
            ReloadOutcome::Failed { error, .. } => panic!("reload failed: {error}"),
        };
        assert!(Arc::ptr_eq(&registry::active().unwrap(), &second));
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    #[serial]
    async fn failed_reload_keeps_the_previous_registry() {
        registry::reset_active();
        let ws = tempfile::tempdir().unwrap();
        write_plugin(&ws.path().join("plugins"), "stable", "");
        let mut params = workspace_params(ws.path());

        let previous = match reload_plugins(&params).await {
            ReloadOutcome::Reloaded { registry, .. } => registry,
            ReloadOutcome::Failed { error, .. } => panic!("setup reload failed: {error}"),
        };

        params.module_loader = Arc::new(BrokenRuntime);
        let outcome = reload_plugins(&params).await;
        match outcome {
            ReloadOutcome::Failed { error, .. } => {
                assert!(error.contains("runtime unavailable"));
            },
            ReloadOutcome::Reloaded { .. } => panic!("expected failure"),
        }
        assert!(Arc::ptr_eq(&registry::active().unwrap(), &previous));
    }

    #[tokio::test]
    #[serial]
    async fn reload_picks_up_edited_plugins() {
        registry::reset_active();
        let ws = tempfile::tempdir().unwrap();
        let plugins_dir = ws.path().join("plugins");
        write_plugin(&plugins_dir, "live", "\n[[hooks]]\nevent = \"tick\"\n");
        let params = workspace_params(ws.path());

        let outcome = reload_plugins(&params).await;
        assert!(outcome.is_ok());
        assert_eq!(registry::active().unwrap().hook_count(), 1);

        // Edit the plugin on disk; reload must re-evaluate the module.
        std::fs::write(
            plugins_dir.join("live").join("plugin.toml"),
            "id = \"live\"\n[[hooks]]\nevent = \"tick\"\n[[hooks]]\nevent = \"tock\"\n",
        )
        .unwrap();

        let outcome = reload_plugins(&params).await;
        assert!(outcome.is_ok());
        assert_eq!(registry::active().unwrap().hook_count(), 2);
    }

    #[tokio::test]
    #[serial]
    async fn reload_clears_stale_commands() {
        registry::reset_active();
        let ws = tempfile::tempdir().unwrap();
        let plugins_dir = ws.path().join("plugins");
        write_plugin(
            &plugins_dir,
            "chatty",
            "\n[[commands]]\nname = \"old\"\nreply = \"old\"\n",
        );
        let params = workspace_params(ws.path());

        assert!(reload_plugins(&params).await.is_ok());
        assert!(CommandRegistry::global().get("old").is_some());

        std::fs::write(
            plugins_dir.join("chatty").join("plugin.toml"),
            "id = \"chatty\"\n[[commands]]\nname = \"new\"\nreply = \"new\"\n",
        )
        .unwrap();

        assert!(reload_plugins(&params).await.is_ok());
        assert!(CommandRegistry::global().get("old").is_none());
        assert!(CommandRegistry::global().get("new").is_some());
    }

    #[tokio::test]
    #[serial]
    async fn refresh_returns_a_fresh_generation() {
        registry::reset_active();
        let ws = tempfile::tempdir().unwrap();
        write_plugin(&ws.path().join("plugins"), "r", "");
        let params = workspace_params(ws.path());

        let first = refresh_plugins(&params).await.unwrap();
        let second = refresh_plugins(&params).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&registry::active().unwrap(), &second));
    }

    #[tokio::test]
    #[serial]
    async fn outcome_reports_a_measured_duration() {
        registry::reset_active();
        let started = Instant::now();
        let outcome = reload_plugins(&workspace_params(Path::new("/no/such/dir"))).await;
        assert!(outcome.is_ok());
        // Measured inside the call, so it cannot exceed our own window.
        assert!(outcome.duration() <= started.elapsed());
    }
}
