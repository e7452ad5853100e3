//! `keel status`: pending changes, computed locally.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use keel_patch::ConfigPatch;
use keel_sync::{plan, CategorySet, ChangeKind, PendingChange, PushPlan};

use super::Project;

/// Arguments for `keel status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Project root.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Comma-separated categories: config, migrations, functions, workflows.
    #[arg(long)]
    pub only: Option<CategorySet>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::open(&self.path)?;
        let remote_id = project
            .cache
            .require_remote_id(project.local.layout().root())?;
        let last_pushed_at = project.cache.last_pushed_at()?;

        let include = self.only.unwrap_or_default();
        let pending = plan(&project.local, &project.cache, &include)
            .context("failed to compute pending changes")?;

        if self.json {
            let payload = StatusJson {
                remote_id: remote_id.to_string(),
                last_pushed_at,
                plan: &pending,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&remote_id.to_string(), last_pushed_at, &pending);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusJson<'a> {
    remote_id: String,
    last_pushed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    plan: &'a PushPlan,
}

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "change")]
    change: String,
    #[tabled(rename = "key")]
    key: String,
}

fn print_table(remote_id: &str, last_pushed_at: Option<DateTime<Utc>>, pending: &PushPlan) {
    let last_push = last_pushed_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "keel v{} | remote {} | last push {}",
        env!("CARGO_PKG_VERSION"),
        remote_id,
        last_push,
    );

    if pending.is_empty() {
        println!("{}", "Everything up to date.".green());
        return;
    }

    let mut rows = Vec::new();
    if let Some(patch) = &pending.config_patch {
        rows.push(ChangeRow {
            category: "configuration".to_string(),
            change: "patch".yellow().to_string(),
            key: summarize_patch(patch),
        });
    }
    rows.extend(pending.changes.iter().map(row));

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("Run 'keel push' to apply.");
}

fn row(change: &PendingChange) -> ChangeRow {
    let label = change.kind.to_string();
    let change_label = match change.kind {
        ChangeKind::Created => label.green(),
        ChangeKind::Updated => label.yellow(),
        ChangeKind::Deleted => label.red(),
    };
    ChangeRow {
        category: change.category.to_string(),
        change: change_label.to_string(),
        key: change.key.clone(),
    }
}

fn summarize_patch(patch: &ConfigPatch) -> String {
    let mut parts = Vec::new();
    let scalars = [
        ("name", patch.name.is_some()),
        ("title", patch.title.is_some()),
        ("entryFile", patch.entry_file.is_some()),
        ("imports", patch.imports.is_some()),
        ("scopes", patch.scopes.is_some()),
    ];
    for (field, changed) in scalars {
        if changed {
            parts.push(field.to_string());
        }
    }
    if !patch.capabilities.is_empty() {
        parts.push(format!("{} capability op(s)", patch.capabilities.len()));
    }
    if !patch.instances.is_empty() {
        parts.push(format!("{} instance op(s)", patch.instances.len()));
    }
    parts.join(", ")
}
