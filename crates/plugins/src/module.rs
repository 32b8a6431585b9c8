//! The module-loading seam.
//!
//! Importing and evaluating plugin code is an external concern; the
//! loader only needs something that turns a discovered plugin into a
//! [`LoadedModule`]. The built-in [`DeclarativeLoader`] materializes
//! modules purely from manifest declarations; code-executing runtimes
//! plug in through the same trait.

use std::{path::Path, sync::Arc};

use {
    async_trait::async_trait,
    tracing::{debug, info},
};

use crate::{
    api::{
        CommandInvocation, CommandRegistration, GatewayRegistration, HookEvent, HookRegistration,
    },
    manifest::PluginManifest,
};

/// A plugin's evaluated registrations.
#[derive(Default, Clone)]
pub struct LoadedModule {
    pub hooks: Vec<HookRegistration>,
    pub commands: Vec<CommandRegistration>,
    pub gateway: Vec<GatewayRegistration>,
}

/// Turns discovered plugins into loaded modules.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Runtime-level initialization check, run once per load pass.
    /// A failure here aborts the whole pass (reload reports it as
    /// failed); per-plugin problems belong in [`ModuleLoader::load`].
    fn preflight(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Materialize one plugin module. Errors are recorded on the plugin
    /// record and do not abort the pass.
    async fn load(
        &self,
        root: &Path,
        manifest: &PluginManifest,
    ) -> anyhow::Result<Arc<LoadedModule>>;
}

/// Builds modules from manifest declarations alone: hook handlers log,
/// command handlers return the declared reply, gateway handlers return
/// the declared response.
pub struct DeclarativeLoader;

#[async_trait]
impl ModuleLoader for DeclarativeLoader {
    async fn load(
        &self,
        _root: &Path,
        manifest: &PluginManifest,
    ) -> anyhow::Result<Arc<LoadedModule>> {
        let mut module = LoadedModule::default();

        for decl in &manifest.hooks {
            let plugin_id = manifest.id.clone();
            let message = decl.message.clone();
            module.hooks.push(HookRegistration {
                event: decl.event.clone(),
                handler: Arc::new(move |event: HookEvent| {
                    let plugin_id = plugin_id.clone();
                    let message = message.clone();
                    Box::pin(async move {
                        match &message {
                            Some(m) => info!(plugin = %plugin_id, event = %event.name, "{m}"),
                            None => debug!(plugin = %plugin_id, event = %event.name, "hook fired"),
                        }
                        Ok(())
                    })
                }),
            });
        }

        for decl in &manifest.commands {
            let reply = decl
                .reply
                .clone()
                .unwrap_or_else(|| format!("{} ran", decl.name));
            module.commands.push(CommandRegistration {
                name: decl.name.clone(),
                description: decl.description.clone(),
                handler: Arc::new(move |_invocation: CommandInvocation| {
                    let reply = reply.clone();
                    Box::pin(async move { Ok(reply) })
                }),
            });
        }

        for decl in &manifest.gateway {
            let response = decl
                .response
                .clone()
                .unwrap_or_else(|| serde_json::json!({ "ok": true }));
            module.gateway.push(GatewayRegistration {
                method: decl.method.clone(),
                handler: Arc::new(move |_params: serde_json::Value| {
                    let response = response.clone();
                    Box::pin(async move { Ok(response) })
                }),
            });
        }

        Ok(Arc::new(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest;

    #[tokio::test]
    async fn declarative_loader_materializes_declarations() {
        let manifest = parse_manifest(
            r#"
            id = "echo"

            [[hooks]]
            event = "message.received"

            [[commands]]
            name = "echo"
            reply = "pong"

            [[gateway]]
            method = "echo.status"
            response = { ready = true }
            "#,
            Path::new("plugin.toml"),
        )
        .unwrap();

        let module = DeclarativeLoader
            .load(Path::new("/tmp"), &manifest)
            .await
            .unwrap();

        assert_eq!(module.hooks.len(), 1);
        assert_eq!(module.hooks[0].event, "message.received");

        let reply = (module.commands[0].handler)(CommandInvocation {
            command: "echo".into(),
            args: vec![],
            sender: None,
        })
        .await
        .unwrap();
        assert_eq!(reply, "pong");

        let response = (module.gateway[0].handler)(serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(response, serde_json::json!({ "ready": true }));
    }

    #[tokio::test]
    async fn empty_manifest_yields_empty_module() {
        let manifest = parse_manifest("id = \"bare\"\n", Path::new("plugin.toml")).unwrap();
        let module = DeclarativeLoader
            .load(Path::new("/tmp"), &manifest)
            .await
            .unwrap();
        assert!(module.hooks.is_empty());
        assert!(module.commands.is_empty());
        assert!(module.gateway.is_empty());
    }
}
