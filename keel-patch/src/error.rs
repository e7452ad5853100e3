//! Error types for keel-patch.

use thiserror::Error;

/// All errors that can arise while diffing or compiling a patch.
///
/// Every variant is an invariant violation: the document schema is closed,
/// so a well-formed pair of documents never produces one.
#[derive(Debug, Error)]
pub enum PatchError {
    /// A diff path that the compiler has no rule for.
    #[error("unhandled diff path {path}")]
    UnhandledPath { path: String },

    /// A list index that does not resolve against the previous document.
    #[error("index {index} out of range for '{list}'")]
    IndexOutOfRange { list: &'static str, index: usize },

    /// A nested edit that cannot be applied to the in-progress value.
    #[error("cannot apply edit at {path}: {reason}")]
    InvalidEdit { path: String, reason: String },

    /// A patched value that no longer matches its typed shape.
    #[error("invalid value at {path}: {source}")]
    InvalidValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Document (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
