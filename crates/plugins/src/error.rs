use std::path::PathBuf;

use thiserror::Error;

/// Per-plugin load failures.
///
/// Recovered by the loader: the plugin is recorded with status `error`
/// and the pass continues with the remaining candidates.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("config for '{id}' rejected: {reason}")]
    ConfigRejected { id: String, reason: String },

    #[error("module load for '{id}' failed: {reason}")]
    ModuleLoad { id: String, reason: String },
}
