//! `keel init --remote-id <ID> [PATH]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use keel_core::{ProjectId, ProjectLayout};
use keel_sync::StateCache;

/// Bind a project checkout to a remote project.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project root (the directory holding project.json).
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Identifier of the remote project to push to.
    #[arg(long)]
    pub remote_id: String,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let root = super::resolve(&self.path)?;
        let layout = ProjectLayout::new(root);
        let baseline = layout
            .load_config()
            .with_context(|| format!("cannot read project in '{}'", layout.root().display()))?;

        let mut cache = StateCache::create(&layout).context("failed to create state cache")?;
        let remote_id = ProjectId::from(self.remote_id);
        let fresh = cache
            .provision(&remote_id, &baseline)
            .with_context(|| format!("failed to bind '{}'", layout.root().display()))?;

        if fresh {
            println!(
                "✓ Bound '{}' to remote project '{}'",
                baseline.name, remote_id
            );
            println!("  State cache: {}", layout.state_db_path().display());
        } else {
            println!("Already bound to remote project '{remote_id}'.");
        }
        Ok(())
    }
}
