//! Plugin manifest (`plugin.toml`) parsing and validation.
//!
//! The manifest declares the plugin id, an optional config schema, and
//! the plugin's declarative registrations (hooks, commands, gateway
//! methods). The schema and validation rules are a contract consumed
//! here, not owned: code-executing module loaders read the same file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PluginError;

/// Manifest file expected at every plugin root.
pub const MANIFEST_FILENAME: &str = "plugin.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    /// Unique plugin id: lowercase alphanumeric plus `-`/`_`, starting
    /// alphanumeric.
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,

    /// Schema for the plugin's `plugins.entries.<id>.config` section.
    /// An empty table is valid — the plugin takes no config.
    pub config: Option<toml::Table>,

    pub hooks: Vec<HookDecl>,
    pub commands: Vec<CommandDecl>,
    pub gateway: Vec<GatewayDecl>,
}

/// A declared hook subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct HookDecl {
    pub event: String,
    /// Optional message logged when the hook fires (declarative modules).
    #[serde(default)]
    pub message: Option<String>,
}

/// A declared user-facing command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandDecl {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Static reply text (declarative modules).
    #[serde(default)]
    pub reply: Option<String>,
}

/// A declared gateway method.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayDecl {
    pub method: String,
    /// Static response payload (declarative modules).
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

/// Read and validate the manifest at `<root>/plugin.toml`.
pub fn load_manifest(root: &Path) -> Result<(PluginManifest, PathBuf), PluginError> {
    let path = root.join(MANIFEST_FILENAME);
    let raw = std::fs::read_to_string(&path).map_err(|source| PluginError::ManifestRead {
        path: path.clone(),
        source,
    })?;
    let manifest = parse_manifest(&raw, &path)?;
    Ok((manifest, path))
}

/// Parse and validate manifest text.
pub fn parse_manifest(raw: &str, path: &Path) -> Result<PluginManifest, PluginError> {
    let manifest: PluginManifest =
        toml::from_str(raw).map_err(|e| PluginError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate(&manifest, path)?;
    Ok(manifest)
}

fn validate(manifest: &PluginManifest, path: &Path) -> Result<(), PluginError> {
    let invalid = |reason: String| PluginError::ManifestInvalid {
        path: path.to_path_buf(),
        reason,
    };

    if manifest.id.is_empty() {
        return Err(invalid("missing plugin id".into()));
    }
    let mut chars = manifest.id.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let rest_ok = manifest
        .id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !first_ok || !rest_ok {
        return Err(invalid(format!("invalid plugin id '{}'", manifest.id)));
    }

    for hook in &manifest.hooks {
        if hook.event.is_empty() {
            return Err(invalid("hook with empty event name".into()));
        }
    }
    for command in &manifest.commands {
        if command.name.is_empty() {
            return Err(invalid("command with empty name".into()));
        }
    }
    for gateway in &manifest.gateway {
        if gateway.method.is_empty() {
            return Err(invalid("gateway entry with empty method".into()));
        }
    }
    Ok(())
}

/// Check a configured `entries.<id>.config` value against the manifest's
/// declared schema: the value must be a table and every key must appear
/// in the schema.
pub fn check_entry_config(
    manifest: &PluginManifest,
    provided: &serde_json::Value,
) -> Result<(), PluginError> {
    let rejected = |reason: String| PluginError::ConfigRejected {
        id: manifest.id.clone(),
        reason,
    };

    let Some(schema) = &manifest.config else {
        return Err(rejected("plugin declares no config schema".into()));
    };
    let Some(obj) = provided.as_object() else {
        return Err(rejected("config must be a table".into()));
    };
    for key in obj.keys() {
        if !schema.contains_key(key) {
            return Err(rejected(format!("unknown config key '{key}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<PluginManifest, PluginError> {
        parse_manifest(raw, Path::new("plugin.toml"))
    }

    #[test]
    fn parses_full_manifest() {
        let manifest = parse(
            r#"
            id = "weather"
            name = "Weather"
            description = "Forecast lookups"

            [config]
            api_key = "string"

            [[hooks]]
            event = "message.received"
            message = "saw a message"

            [[commands]]
            name = "weather"
            description = "Current forecast"
            reply = "sunny"

            [[gateway]]
            method = "weather.status"
            response = { ok = true }
            "#,
        )
        .unwrap();

        assert_eq!(manifest.id, "weather");
        assert_eq!(manifest.hooks.len(), 1);
        assert_eq!(manifest.commands.len(), 1);
        assert_eq!(manifest.gateway.len(), 1);
        assert!(manifest.config.unwrap().contains_key("api_key"));
    }

    #[test]
    fn minimal_manifest_with_empty_schema() {
        let manifest = parse("id = \"solo\"\n\n[config]\n").unwrap();
        assert_eq!(manifest.id, "solo");
        assert!(manifest.config.unwrap().is_empty());
        assert!(manifest.hooks.is_empty());
    }

    #[test]
    fn rejects_missing_id() {
        assert!(matches!(
            parse("name = \"nope\"\n"),
            Err(PluginError::ManifestInvalid { .. })
        ));
    }

    #[test]
    fn rejects_bad_id() {
        assert!(parse("id = \"Has Spaces\"\n").is_err());
        assert!(parse("id = \"-leading\"\n").is_err());
        assert!(parse("id = \"UPPER\"\n").is_err());
        assert!(parse("id = \"ok-id_2\"\n").is_ok());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(parse("id = ").is_err());
    }

    #[test]
    fn entry_config_checked_against_schema() {
        let manifest = parse("id = \"a\"\n\n[config]\nkey = \"string\"\n").unwrap();
        assert!(check_entry_config(&manifest, &serde_json::json!({ "key": "v" })).is_ok());
        assert!(check_entry_config(&manifest, &serde_json::json!({ "other": 1 })).is_err());
        assert!(check_entry_config(&manifest, &serde_json::json!("not a table")).is_err());

        let no_schema = parse("id = \"a\"\n").unwrap();
        assert!(check_entry_config(&no_schema, &serde_json::json!({})).is_err());
    }
}
