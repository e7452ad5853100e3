//! On-disk project layout.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   project.json                  (configuration document)
//!   migrations/<version>[_<name>].sql
//!   functions/<function>/**       (arbitrary file tree per function)
//!   workflows/*.json
//!   .keel/
//!     state.db                    (local state cache)
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};
use crate::types::ConfigDocument;

pub const CONFIG_FILE: &str = "project.json";
pub const MIGRATIONS_DIR: &str = "migrations";
pub const FUNCTIONS_DIR: &str = "functions";
pub const WORKFLOWS_DIR: &str = "workflows";
pub const STATE_DIR: &str = ".keel";
pub const STATE_DB: &str = "state.db";

/// Resolves every path the engine reads below a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join(MIGRATIONS_DIR)
    }

    pub fn functions_dir(&self) -> PathBuf {
        self.root.join(FUNCTIONS_DIR)
    }

    pub fn function_dir(&self, function: &str) -> PathBuf {
        self.functions_dir().join(function)
    }

    pub fn workflows_dir(&self) -> PathBuf {
        self.root.join(WORKFLOWS_DIR)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// `<root>/.keel/state.db`, pure, no I/O.
    pub fn state_db_path(&self) -> PathBuf {
        self.state_dir().join(STATE_DB)
    }

    /// Load and validate `project.json`.
    ///
    /// Returns `CoreError::ConfigNotFound` if absent,
    /// `CoreError::Parse` (with path) if malformed.
    pub fn load_config(&self) -> Result<ConfigDocument, CoreError> {
        let path = self.config_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CoreError::ConfigNotFound { path })
            }
            Err(err) => return Err(io_err(&path, err)),
        };
        let document: ConfigDocument = serde_json::from_str(&contents)
            .map_err(|source| CoreError::Parse { path, source })?;
        document.validate()?;
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn state_db_path_is_under_dot_keel() {
        let layout = ProjectLayout::new("/work/shop");
        assert!(layout.state_db_path().ends_with(".keel/state.db"));
        assert!(layout.function_dir("hello").ends_with("functions/hello"));
    }

    #[test]
    fn missing_config_is_reported_with_path() {
        let tmp = TempDir::new().unwrap();
        let err = ProjectLayout::new(tmp.path()).load_config().unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }));
        assert!(err.to_string().contains("project.json"));
    }
}
