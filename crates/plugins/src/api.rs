//! Types plugins register with the host: hook, command, and gateway
//! method handlers.

use std::{future::Future, pin::Pin, sync::Arc};

/// Event delivered to hook handlers.
#[derive(Debug, Clone)]
pub struct HookEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl HookEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// A chat command invocation.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub command: String,
    pub args: Vec<String>,
    pub sender: Option<String>,
}

/// A boxed async hook handler.
pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type HookFn = Arc<dyn Fn(HookEvent) -> HookFuture + Send + Sync>;

/// A boxed async command handler; returns the reply text.
pub type CommandFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;
pub type CommandFn = Arc<dyn Fn(CommandInvocation) -> CommandFuture + Send + Sync>;

/// A boxed async gateway method handler.
pub type GatewayFuture = Pin<Box<dyn Future<Output = anyhow::Result<serde_json::Value>> + Send>>;
pub type GatewayFn = Arc<dyn Fn(serde_json::Value) -> GatewayFuture + Send + Sync>;

/// A hook a module attaches to a host event.
#[derive(Clone)]
pub struct HookRegistration {
    pub event: String,
    pub handler: HookFn,
}

/// A user-facing command a module provides.
#[derive(Clone)]
pub struct CommandRegistration {
    pub name: String,
    pub description: Option<String>,
    pub handler: CommandFn,
}

/// A gateway method a module provides.
#[derive(Clone)]
pub struct GatewayRegistration {
    pub method: String,
    pub handler: GatewayFn,
}
