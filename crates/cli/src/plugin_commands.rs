use std::path::PathBuf;

use {
    anyhow::Result,
    clap::Subcommand,
    tracing::{error, info},
};

use {
    kestrel_config::discover_and_load,
    kestrel_plugins::{LoadParams, PluginStatus, ReloadOutcome, loader, registry, reload_plugins},
};

#[derive(Subcommand)]
pub enum PluginAction {
    /// List discovered plugins and their status.
    List {
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Re-discover and reload all plugins once, then print the outcome.
    Reload {
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}

pub async fn handle(action: PluginAction) -> Result<()> {
    match action {
        PluginAction::List { workspace } => list(workspace).await,
        PluginAction::Reload { workspace } => reload(workspace).await,
    }
}

fn params(workspace: Option<PathBuf>) -> LoadParams {
    let mut params = LoadParams::new(discover_and_load());
    params.workspace_dir = workspace;
    params
}

async fn list(workspace: Option<PathBuf>) -> Result<()> {
    let registry = loader::load(&params(workspace)).await?;
    if registry.plugins.is_empty() {
        println!("no plugins found");
        return Ok(());
    }
    for plugin in &registry.plugins {
        let detail = match plugin.status {
            PluginStatus::Error => plugin.error.clone().unwrap_or_default(),
            _ => format!(
                "{} hooks, {} commands, {} gateway methods",
                plugin.hook_events.len(),
                plugin.command_names.len(),
                plugin.gateway_methods.len()
            ),
        };
        println!("{:<24} {:<9} {detail}", plugin.id, plugin.status);
    }
    for conflict in &registry.gateway_conflicts {
        println!(
            "conflict: {} from {} shadowed by {}",
            conflict.method,
            conflict.plugin_id,
            conflict.existing.as_deref().unwrap_or("core")
        );
    }
    Ok(())
}

async fn reload(workspace: Option<PathBuf>) -> Result<()> {
    match reload_plugins(&params(workspace)).await {
        ReloadOutcome::Reloaded {
            plugins,
            hooks,
            duration,
            ..
        } => {
            println!(
                "reloaded: {plugins} plugins, {hooks} hooks in {}ms",
                duration.as_millis()
            );
            Ok(())
        },
        ReloadOutcome::Failed { error, duration } => {
            anyhow::bail!("reload failed after {}ms: {error}", duration.as_millis())
        },
    }
}

/// Run the host loop: initial plugin load, then wait for reload signals.
pub async fn serve(workspace: Option<PathBuf>) -> Result<()> {
    let params = params(workspace);
    let loaded = loader::load(&params).await?;
    registry::publish(loaded.clone());
    info!(
        plugins = loaded.loaded_count(),
        hooks = loaded.hook_count(),
        "plugins loaded"
    );

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut reload_signal = signal(SignalKind::user_defined2())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    return Ok(());
                },
                _ = reload_signal.recv() => {
                    info!("SIGUSR2 received, reloading plugins");
                    match reload_plugins(&params).await {
                        ReloadOutcome::Reloaded { plugins, hooks, duration, .. } => {
                            info!(
                                plugins,
                                hooks,
                                duration_ms = duration.as_millis() as u64,
                                "hot reload complete"
                            );
                        },
                        ReloadOutcome::Failed { error, duration } => {
                            error!(
                                %error,
                                duration_ms = duration.as_millis() as u64,
                                "hot reload failed, previous plugin set kept"
                            );
                        },
                    }
                },
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("shutting down");
        Ok(())
    }
}
