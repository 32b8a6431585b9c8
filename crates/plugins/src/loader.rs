//! Plugin loading: manifest validation, module evaluation, registry
//! assembly, and the loader-level registry cache.
//!
//! Loading is best-effort per candidate: one broken plugin is recorded
//! with status `error` and never takes down the rest of the pass.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tracing::{debug, info, warn};

use kestrel_config::KestrelConfig;

use crate::{
    api::GatewayFn,
    commands::{CommandRegistry, RegisteredCommand},
    discovery::{self, PluginCandidate},
    error::PluginError,
    manifest,
    module::{DeclarativeLoader, ModuleLoader},
    module_cache::ModuleCache,
    registry::{
        GatewayBinding, GatewayConflict, HookDescriptor, PluginRecord, PluginRegistry,
        PluginStatus,
    },
};

/// Parameters for one load pass.
#[derive(Clone)]
pub struct LoadParams {
    pub config: KestrelConfig,
    pub workspace_dir: Option<PathBuf>,
    /// Host-provided gateway methods that plugin handlers merge against.
    /// A plugin may add methods but never replace one of these.
    pub core_gateway: HashMap<String, GatewayFn>,
    pub module_loader: Arc<dyn ModuleLoader>,
    /// When true, an equivalent parameter set returns the previously
    /// assembled registry (the same Arc). Reload always passes false.
    pub cache: bool,
}

impl LoadParams {
    pub fn new(config: KestrelConfig) -> Self {
        Self {
            config,
            workspace_dir: None,
            core_gateway: HashMap::new(),
            module_loader: Arc::new(DeclarativeLoader),
            cache: true,
        }
    }
}

struct CachedLoad {
    fingerprint: String,
    registry: Arc<PluginRegistry>,
}

static LOAD_CACHE: Mutex<Option<CachedLoad>> = Mutex::new(None);

/// Options for [`clear_caches`].
#[derive(Debug, Clone, Default)]
pub struct ClearCacheOptions {
    /// Source paths to hand to the module cache buster in the same step.
    pub plugin_source_paths: Option<Vec<PathBuf>>,
}

/// Drop the loader-level registry cache and, when source paths are
/// given, purge those modules from the module cache so the next pass
/// re-evaluates them. Loading itself never purges.
pub fn clear_caches(opts: &ClearCacheOptions) {
    *LOAD_CACHE.lock().unwrap() = None;
    if let Some(paths) = &opts.plugin_source_paths {
        let purged = ModuleCache::global().purge(paths);
        debug!(purged, "module cache purged");
    }
}

/// Discover, validate, and load the full plugin set into a new registry.
///
/// With `cache=true`, an unchanged parameter set returns the cached
/// registry by reference. With `cache=false` the pass is always fresh
/// and the cache is neither read nor written — that path belongs to
/// reload, which owns cache invalidation explicitly.
pub async fn load(params: &LoadParams) -> anyhow::Result<Arc<PluginRegistry>> {
    let candidates = discovery::discover(params.workspace_dir.as_deref(), &params.config.plugins);

    if params.cache {
        let key = fingerprint(params, &candidates);
        let cached = LOAD_CACHE
            .lock()
            .unwrap()
            .as_ref()
            .filter(|c| c.fingerprint == key)
            .map(|c| c.registry.clone());
        if let Some(registry) = cached {
            debug!("returning cached plugin registry");
            return Ok(registry);
        }
        let registry = assemble(params, &candidates).await?;
        *LOAD_CACHE.lock().unwrap() = Some(CachedLoad {
            fingerprint: key,
            registry: registry.clone(),
        });
        return Ok(registry);
    }

    assemble(params, &candidates).await
}

/// Cache key over the effective load parameters: workspace, configured
/// search paths, and the discovered candidate set.
fn fingerprint(params: &LoadParams, candidates: &[PluginCandidate]) -> String {
    let mut key = String::new();
    if let Some(ws) = &params.workspace_dir {
        key.push_str(&ws.display().to_string());
    }
    key.push('\n');
    for path in &params.config.plugins.load_paths {
        key.push_str(&path.display().to_string());
        key.push('\n');
    }
    for candidate in candidates {
        key.push_str(&candidate.root.display().to_string());
        key.push('\n');
    }
    key
}

async fn assemble(
    params: &LoadParams,
    candidates: &[PluginCandidate],
) -> anyhow::Result<Arc<PluginRegistry>> {
    // Runtime-level initialization; an error here is fatal to the pass.
    params.module_loader.preflight()?;

    let mut plugins: Vec<PluginRecord> = Vec::new();
    let mut hooks: Vec<HookDescriptor> = Vec::new();
    let mut gateway: HashMap<String, GatewayBinding> = params
        .core_gateway
        .iter()
        .map(|(method, handler)| {
            (method.clone(), GatewayBinding {
                plugin_id: None,
                handler: handler.clone(),
            })
        })
        .collect();
    let mut conflicts: Vec<GatewayConflict> = Vec::new();

    for candidate in candidates {
        let source = canonical(&candidate.manifest_path);

        let manifest = match manifest::load_manifest(&candidate.root) {
            Ok((manifest, _)) => manifest,
            Err(e) => {
                warn!(root = %candidate.root.display(), error = %e, "plugin manifest rejected");
                plugins.push(failed_record(candidate, source, &e));
                continue;
            },
        };

        if plugins.iter().any(|p| p.id == manifest.id) {
            warn!(
                id = %manifest.id,
                root = %candidate.root.display(),
                "duplicate plugin id, skipping candidate"
            );
            continue;
        }

        if let Some(provided) = params
            .config
            .plugins
            .get(&manifest.id)
            .and_then(|e| e.config.as_ref())
            && let Err(e) = manifest::check_entry_config(&manifest, provided)
        {
            warn!(id = %manifest.id, error = %e, "plugin config rejected");
            plugins.push(PluginRecord {
                id: manifest.id.clone(),
                root: candidate.root.clone(),
                source,
                status: PluginStatus::Error,
                error: Some(e.to_string()),
                hook_events: vec![],
                command_names: vec![],
                gateway_methods: vec![],
            });
            continue;
        }

        if !params.config.plugins.is_enabled(&manifest.id) {
            debug!(id = %manifest.id, "plugin disabled by config");
            plugins.push(PluginRecord {
                id: manifest.id.clone(),
                root: candidate.root.clone(),
                source,
                status: PluginStatus::Disabled,
                error: None,
                hook_events: vec![],
                command_names: vec![],
                gateway_methods: vec![],
            });
            continue;
        }

        let module = match ModuleCache::global()
            .get_or_load(&source, || {
                params.module_loader.load(&candidate.root, &manifest)
            })
            .await
        {
            Ok(module) => module,
            Err(e) => {
                let err = PluginError::ModuleLoad {
                    id: manifest.id.clone(),
                    reason: e.to_string(),
                };
                warn!(id = %manifest.id, error = %err, "plugin module load failed");
                plugins.push(PluginRecord {
                    id: manifest.id.clone(),
                    root: candidate.root.clone(),
                    source,
                    status: PluginStatus::Error,
                    error: Some(err.to_string()),
                    hook_events: vec![],
                    command_names: vec![],
                    gateway_methods: vec![],
                });
                continue;
            },
        };

        for hook in &module.hooks {
            hooks.push(HookDescriptor {
                event: hook.event.clone(),
                plugin_id: manifest.id.clone(),
                handler: hook.handler.clone(),
            });
        }

        for command in &module.commands {
            CommandRegistry::global().register(&command.name, RegisteredCommand {
                plugin_id: manifest.id.clone(),
                description: command.description.clone(),
                handler: command.handler.clone(),
            });
        }

        for registration in &module.gateway {
            if let Some(existing) = gateway.get(&registration.method) {
                warn!(
                    method = %registration.method,
                    plugin = %manifest.id,
                    existing = existing.plugin_id.as_deref().unwrap_or("core"),
                    "gateway method conflict, keeping existing binding"
                );
                conflicts.push(GatewayConflict {
                    method: registration.method.clone(),
                    plugin_id: manifest.id.clone(),
                    existing: existing.plugin_id.clone(),
                });
            } else {
                gateway.insert(registration.method.clone(), GatewayBinding {
                    plugin_id: Some(manifest.id.clone()),
                    handler: registration.handler.clone(),
                });
            }
        }

        plugins.push(PluginRecord {
            id: manifest.id.clone(),
            root: candidate.root.clone(),
            source,
            status: PluginStatus::Loaded,
            error: None,
            hook_events: module.hooks.iter().map(|h| h.event.clone()).collect(),
            command_names: module.commands.iter().map(|c| c.name.clone()).collect(),
            gateway_methods: module.gateway.iter().map(|g| g.method.clone()).collect(),
        });
    }

    let registry = Arc::new(PluginRegistry {
        plugins,
        hooks,
        gateway,
        gateway_conflicts: conflicts,
    });
    info!(
        plugins = registry.loaded_count(),
        hooks = registry.hook_count(),
        "plugin load pass complete"
    );
    Ok(registry)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Record for a candidate whose manifest never parsed; the directory
/// name stands in for the unknown id.
fn failed_record(candidate: &PluginCandidate, source: PathBuf, err: &PluginError) -> PluginRecord {
    let id = candidate
        .root
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();
    PluginRecord {
        id,
        root: candidate.root.clone(),
        source,
        status: PluginStatus::Error,
        error: Some(err.to_string()),
        hook_events: vec![],
        command_names: vec![],
        gateway_methods: vec![],
    }
}
