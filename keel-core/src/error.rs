//! Error types for keel-core.

use std::path::PathBuf;

use thiserror::Error;

/// Schema violations and I/O failures raised while reading a project.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON in a document with a known origin.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON (de)serialization error without file context.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate capability name '{name}'")]
    DuplicateCapability { name: String },

    #[error("duplicate plugin instance name '{name}'")]
    DuplicateInstance { name: String },

    /// Migration file stem does not match `^\d{12}(_[a-z0-9_]{0,26})?$`.
    #[error("invalid migration file name '{name}': expected <12-digit version>[_<name>].sql")]
    InvalidMigrationName { name: String },

    #[error("invalid workflow at {path}: {reason}")]
    InvalidWorkflow { path: PathBuf, reason: String },

    #[error("duplicate workflow name '{name}' (also defined in {path})")]
    DuplicateWorkflow { name: String, path: PathBuf },

    /// The project root has no `project.json`.
    #[error("project configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },
}

/// Convenience constructor for [`CoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
