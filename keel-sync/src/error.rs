//! Error types for keel-sync.

use std::path::PathBuf;

use thiserror::Error;

use keel_core::{CoreError, ProjectId};
use keel_patch::PatchError;

use crate::category::Category;
use crate::report::{EntityFailure, PushReport};

/// All errors that can arise from cache access, detection and push runs.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Schema violation while reading the local project.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The configuration patch could not be compiled.
    #[error("patch compilation failed: {0}")]
    Patch(#[from] PatchError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failure.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// State cache (SQLite) error.
    #[error("state cache error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Cached document (de)serialization error.
    #[error("state cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cache holds no remote project id; the project was never provisioned.
    #[error("project at {path} is not provisioned; run `keel init` first")]
    NotProvisioned { path: PathBuf },

    #[error("project is already bound to remote '{existing}', refusing to bind it to '{requested}'")]
    AlreadyProvisioned {
        existing: ProjectId,
        requested: ProjectId,
    },

    /// The cache has no last-pushed configuration to diff against.
    #[error("no configuration baseline in the state cache")]
    MissingBaseline,

    /// One or more remote calls were rejected. Everything else was committed.
    #[error("{} remote operation(s) rejected", .failures.len())]
    Rejected {
        report: Box<PushReport>,
        failures: Vec<EntityFailure>,
    },

    /// The remote side accepted `keys` but the cache could not record them.
    /// They will be detected again on the next run.
    #[error("{} accepted {category} change(s) not recorded locally: {source}", .keys.len())]
    Uncommitted {
        category: Category,
        keys: Vec<String>,
        source: Box<SyncError>,
    },

    /// A run stopped on `source` after some remote calls had been rejected.
    #[error("{source} ({} remote operation(s) rejected before that)", .failures.len())]
    Aborted {
        failures: Vec<EntityFailure>,
        source: Box<SyncError>,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
