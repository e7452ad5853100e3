pub mod diff;
pub mod init;
pub mod projects;
pub mod push;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use keel_core::ProjectLayout;
use keel_sync::{LocalState, StateCache};

/// A provisioned project checkout with its cache open.
pub struct Project {
    pub local: LocalState,
    pub cache: StateCache,
}

impl Project {
    pub fn open(path: &Path) -> Result<Self> {
        let root = resolve(path)?;
        let layout = ProjectLayout::new(root);
        let cache = StateCache::open(&layout)
            .with_context(|| format!("failed to open state cache in '{}'", layout.root().display()))?;
        Ok(Self {
            local: LocalState::new(layout),
            cache,
        })
    }
}

pub fn resolve(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("cannot resolve path '{}'", path.display()))
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
