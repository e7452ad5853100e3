//! Locally enumerated entities and their fingerprints.
//!
//! Fingerprints are computed on first use and memoized, so entities that
//! are never compared against the cache are never hashed.

use std::path::PathBuf;

use once_cell::sync::OnceCell;

use keel_core::hash;
use keel_core::{MigrationName, WorkflowDefinition};

/// Anything the change detector can key.
pub trait Entity {
    /// Identity key, unique within one category.
    fn key(&self) -> &str;
}

/// An entity whose content is tracked by fingerprint.
pub trait Fingerprinted: Entity {
    fn fingerprint(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MigrationFile {
    /// File name, e.g. `202301010000_init.sql`.
    pub file_name: String,
    pub name: MigrationName,
    pub path: PathBuf,
    pub content: Vec<u8>,
    fingerprint: OnceCell<String>,
}

impl MigrationFile {
    pub fn new(file_name: String, name: MigrationName, path: PathBuf, content: Vec<u8>) -> Self {
        Self {
            file_name,
            name,
            path,
            content,
            fingerprint: OnceCell::new(),
        }
    }
}

impl Entity for MigrationFile {
    fn key(&self) -> &str {
        &self.file_name
    }
}

impl Fingerprinted for MigrationFile {
    fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| hash::fingerprint(&self.content))
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// A top-level function directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDir {
    pub name: String,
}

impl Entity for FunctionDir {
    fn key(&self) -> &str {
        &self.name
    }
}

/// One file inside a function directory.
#[derive(Debug, Clone)]
pub struct FunctionFile {
    pub function: String,
    /// Path relative to the function root, `/`-separated. This is what the
    /// remote side keys the file by.
    pub server_path: String,
    pub path: PathBuf,
    pub content: Vec<u8>,
    key: String,
    fingerprint: OnceCell<String>,
}

impl FunctionFile {
    pub fn new(function: String, server_path: String, path: PathBuf, content: Vec<u8>) -> Self {
        let key = format!("{function}/{server_path}");
        Self {
            function,
            server_path,
            path,
            content,
            key,
            fingerprint: OnceCell::new(),
        }
    }
}

impl Entity for FunctionFile {
    /// `<function>/<server path>`. Moving a file changes its key, so a move
    /// is detected as a delete of the old path plus a create of the new one.
    fn key(&self) -> &str {
        &self.key
    }
}

impl Fingerprinted for FunctionFile {
    /// Covers the server path too, so a move with identical content still
    /// counts as a change.
    fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            hash::fingerprint_parts([self.server_path.as_bytes(), self.content.as_slice()])
        })
    }
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorkflowFile {
    pub path: PathBuf,
    pub definition: WorkflowDefinition,
    fingerprint: OnceCell<String>,
}

impl WorkflowFile {
    pub fn new(path: PathBuf, definition: WorkflowDefinition) -> Self {
        Self {
            path,
            definition,
            fingerprint: OnceCell::new(),
        }
    }
}

impl Entity for WorkflowFile {
    fn key(&self) -> &str {
        &self.definition.name
    }
}

impl Fingerprinted for WorkflowFile {
    fn fingerprint(&self) -> &str {
        self.fingerprint
            .get_or_init(|| self.definition.data_fingerprint())
    }
}
