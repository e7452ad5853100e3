//! Enumerates the on-disk side of a project.
//!
//! Everything here is rebuilt from disk on every run. A missing category
//! directory is simply an empty category.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use keel_core::migration::MIGRATION_EXTENSION;
use keel_core::{ConfigDocument, CoreError, MigrationName, ProjectLayout, WorkflowDefinition};

use crate::entity::{FunctionDir, FunctionFile, MigrationFile, WorkflowFile};
use crate::error::{io_err, SyncError};

const WORKFLOW_EXTENSION: &str = "json";

/// Read-only view of a project checkout.
#[derive(Debug, Clone)]
pub struct LocalState {
    layout: ProjectLayout,
}

impl LocalState {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Load and validate `project.json`.
    pub fn config(&self) -> Result<ConfigDocument, SyncError> {
        Ok(self.layout.load_config()?)
    }

    /// Every `migrations/*.sql` file, in file name order.
    ///
    /// All names are validated before any content is returned, so one bad
    /// file name fails the whole category.
    pub fn migrations(&self) -> Result<Vec<MigrationFile>, SyncError> {
        let paths = list_entries(&self.layout.migrations_dir(), EntryKind::File)?;
        let mut named = Vec::new();
        for path in paths {
            if !has_extension(&path, MIGRATION_EXTENSION) {
                continue;
            }
            let file_name = file_name(&path);
            let name = MigrationName::parse(&file_name)?;
            named.push((file_name, name, path));
        }

        let mut migrations = Vec::with_capacity(named.len());
        for (file_name, name, path) in named {
            let content = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
            migrations.push(MigrationFile::new(file_name, name, path, content));
        }
        Ok(migrations)
    }

    /// Top-level directories under `functions/`.
    pub fn functions(&self) -> Result<Vec<FunctionDir>, SyncError> {
        let dirs = list_entries(&self.layout.functions_dir(), EntryKind::Dir)?;
        Ok(dirs
            .iter()
            .map(|path| FunctionDir {
                name: file_name(path),
            })
            .collect())
    }

    /// Every file beneath `functions/<function>/`, recursively.
    pub fn function_files(&self, function: &str) -> Result<Vec<FunctionFile>, SyncError> {
        let root = self.layout.function_dir(function);
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|source| SyncError::Walk {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            let server_path = server_path(&root, &path);
            let content = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
            files.push(FunctionFile::new(
                function.to_string(),
                server_path,
                path,
                content,
            ));
        }
        Ok(files)
    }

    /// Every `workflows/*.json` file. Workflow names must be unique.
    pub fn workflows(&self) -> Result<Vec<WorkflowFile>, SyncError> {
        let paths = list_entries(&self.layout.workflows_dir(), EntryKind::File)?;
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut workflows = Vec::new();
        for path in paths {
            if !has_extension(&path, WORKFLOW_EXTENSION) {
                continue;
            }
            let content = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
            let definition = WorkflowDefinition::parse(&path, &content)?;
            if let Some(first) = seen.get(&definition.name) {
                return Err(CoreError::DuplicateWorkflow {
                    name: definition.name,
                    path: first.clone(),
                }
                .into());
            }
            seen.insert(definition.name.clone(), path.clone());
            workflows.push(WorkflowFile::new(path, definition));
        }
        Ok(workflows)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

/// Direct children of `dir` of the given kind, sorted by name.
fn list_entries(dir: &Path, kind: EntryKind) -> Result<Vec<PathBuf>, SyncError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| SyncError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let matches = match kind {
            EntryKind::File => entry.file_type().is_file(),
            EntryKind::Dir => entry.file_type().is_dir(),
        };
        if matches {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `/`-joined path of `path` relative to `root`, regardless of platform.
fn server_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
