//! Hook dispatch over the active registry.
//!
//! The runner keeps a lazily compiled index (event name → ordered
//! handlers) derived from whatever registry is active at first
//! dispatch. The index must never outlive the registry generation it
//! was derived from: reload resets the runner, and the next dispatch
//! re-derives against the new generation.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{
    api::{HookEvent, HookFn},
    registry,
};

#[derive(Clone)]
struct CompiledHook {
    plugin_id: String,
    handler: HookFn,
}

struct HookIndex {
    by_event: HashMap<String, Vec<CompiledHook>>,
}

impl HookIndex {
    fn from_registry(registry: Option<&registry::PluginRegistry>) -> Self {
        let mut by_event: HashMap<String, Vec<CompiledHook>> = HashMap::new();
        if let Some(reg) = registry {
            for hook in &reg.hooks {
                by_event.entry(hook.event.clone()).or_default().push(CompiledHook {
                    plugin_id: hook.plugin_id.clone(),
                    handler: hook.handler.clone(),
                });
            }
        }
        Self { by_event }
    }
}

/// Executes registered hooks in response to host events.
pub struct HookRunner {
    index: Mutex<Option<HookIndex>>,
}

static RUNNER: HookRunner = HookRunner::new();

impl Default for HookRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRunner {
    pub const fn new() -> Self {
        Self {
            index: Mutex::new(None),
        }
    }

    /// The process-wide runner.
    pub fn global() -> &'static HookRunner {
        &RUNNER
    }

    /// Drop all derived dispatch state.
    ///
    /// Safe to call before any dispatch ever ran, and repeatedly.
    /// Dispatches already in flight keep the handler snapshot they took
    /// at start; the next dispatch re-derives from the registry active
    /// at that point.
    pub fn reset(&self) {
        *self.index.lock().unwrap() = None;
        debug!("hook runner reset");
    }

    /// Snapshot the compiled handlers for one event, deriving the index
    /// from the active registry if needed.
    fn handlers_for(&self, event: &str) -> Vec<CompiledHook> {
        let mut index = self.index.lock().unwrap();
        let index = index
            .get_or_insert_with(|| HookIndex::from_registry(registry::active().as_deref()));
        index.by_event.get(event).cloned().unwrap_or_default()
    }

    /// Dispatch an event to every hook registered for it, in registry
    /// order. Handler errors are logged and do not stop later handlers.
    /// Returns the number of handlers invoked.
    pub async fn dispatch(&self, event: HookEvent) -> usize {
        let handlers = self.handlers_for(&event.name);
        let mut invoked = 0;
        for hook in handlers {
            invoked += 1;
            if let Err(e) = (hook.handler)(event.clone()).await {
                warn!(plugin = %hook.plugin_id, event = %event.name, error = %e, "hook handler failed");
            }
        }
        invoked
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use serial_test::serial;

    use super::*;
    use crate::registry::{HookDescriptor, PluginRegistry};

    fn registry_with_hooks(counter: Arc<AtomicUsize>, events: &[&str]) -> Arc<PluginRegistry> {
        let hooks = events
            .iter()
            .map(|event| {
                let counter = counter.clone();
                HookDescriptor {
                    event: (*event).to_string(),
                    plugin_id: "test".into(),
                    handler: Arc::new(move |_| {
                        let counter = counter.clone();
                        Box::pin(async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                    }),
                }
            })
            .collect();
        Arc::new(PluginRegistry {
            plugins: vec![],
            hooks,
            gateway: HashMap::new(),
            gateway_conflicts: vec![],
        })
    }

    #[tokio::test]
    #[serial]
    async fn dispatch_runs_matching_hooks() {
        registry::reset_active();
        let counter = Arc::new(AtomicUsize::new(0));
        registry::publish(registry_with_hooks(
            counter.clone(),
            &["message.received", "message.received", "agent.done"],
        ));

        let runner = HookRunner::new();
        let ran = runner
            .dispatch(HookEvent::new("message.received", serde_json::json!({})))
            .await;
        assert_eq!(ran, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let ran = runner
            .dispatch(HookEvent::new("no.such.event", serde_json::json!({})))
            .await;
        assert_eq!(ran, 0);
    }

    #[tokio::test]
    #[serial]
    async fn reset_rederives_from_new_generation() {
        registry::reset_active();
        let old_counter = Arc::new(AtomicUsize::new(0));
        registry::publish(registry_with_hooks(old_counter.clone(), &["tick"]));

        let runner = HookRunner::new();
        assert_eq!(
            runner.dispatch(HookEvent::new("tick", serde_json::json!({}))).await,
            1
        );

        // New generation with two hooks; without reset the runner keeps
        // the old compiled index.
        let new_counter = Arc::new(AtomicUsize::new(0));
        registry::publish(registry_with_hooks(new_counter.clone(), &["tick", "tick"]));
        assert_eq!(
            runner.dispatch(HookEvent::new("tick", serde_json::json!({}))).await,
            1
        );

        runner.reset();
        assert_eq!(
            runner.dispatch(HookEvent::new("tick", serde_json::json!({}))).await,
            2
        );
        assert_eq!(new_counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_before_any_dispatch_is_safe() {
        let runner = HookRunner::new();
        runner.reset();
        runner.reset();
    }

    #[tokio::test]
    #[serial]
    async fn handler_errors_do_not_stop_later_hooks() {
        registry::reset_active();
        let counter = Arc::new(AtomicUsize::new(0));
        let ok_counter = counter.clone();
        let hooks = vec![
            HookDescriptor {
                event: "tick".into(),
                plugin_id: "bad".into(),
                handler: Arc::new(|_| Box::pin(async { anyhow::bail!("handler broke") })),
            },
            HookDescriptor {
                event: "tick".into(),
                plugin_id: "good".into(),
                handler: Arc::new(move |_| {
                    let counter = ok_counter.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            },
        ];
        registry::publish(Arc::new(PluginRegistry {
            plugins: vec![],
            hooks,
            gateway: HashMap::new(),
            gateway_conflicts: vec![],
        }));

        let runner = HookRunner::new();
        assert_eq!(
            runner.dispatch(HookEvent::new("tick", serde_json::json!({}))).await,
            2
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
