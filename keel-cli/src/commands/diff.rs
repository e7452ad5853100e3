//! `keel diff [PATH]`: last pushed project.json against the local one.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use similar::TextDiff;

use keel_core::layout::CONFIG_FILE;
use keel_sync::SyncError;

use super::Project;

/// Arguments for `keel diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Project root.
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::open(&self.path)?;
        let baseline = project
            .cache
            .config_document()?
            .ok_or(SyncError::MissingBaseline)?;
        let current = project.local.config()?;

        let patch = keel_patch::compile(&baseline, &current)
            .context("failed to compile configuration patch")?;
        if patch.is_empty() {
            println!("No configuration changes.");
            return Ok(());
        }

        let old = baseline.to_json_pretty()?;
        let new = current.to_json_pretty()?;
        let unified = TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&format!("a/{CONFIG_FILE}"), &format!("b/{CONFIG_FILE}"))
            .context_radius(3)
            .to_string();
        print!("{unified}");
        if !unified.ends_with('\n') {
            println!();
        }

        println!();
        println!("Patch:");
        println!(
            "{}",
            serde_json::to_string_pretty(&patch).context("failed to serialize patch")?
        );
        Ok(())
    }
}
