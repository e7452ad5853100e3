//! `keel push`: reconcile the remote project with the local checkout.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use keel_sync::{
    default_concurrency, push, CategoryReport, CategorySet, PushOptions, PushReport,
    RemoteGateway, SyncError,
};

use super::Project;
use crate::http::HttpGateway;

/// Arguments for `keel push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Project root.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Base URL of the remote API.
    #[arg(long, env = "KEEL_ENDPOINT")]
    pub endpoint: String,

    /// Comma-separated categories: config, migrations, functions, workflows.
    #[arg(long)]
    pub only: Option<CategorySet>,

    /// Maximum remote calls in flight (default: available parallelism).
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,
}

impl PushArgs {
    pub fn run(self) -> Result<()> {
        let mut project = Project::open(&self.path)?;
        let remote_id = project
            .cache
            .require_remote_id(project.local.layout().root())?;
        let options = PushOptions {
            concurrency: self.concurrency.unwrap_or_else(default_concurrency),
            include: self.only.unwrap_or_default(),
        };
        let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::from_env(&self.endpoint));
        info!(
            remote = %remote_id,
            endpoint = %self.endpoint,
            concurrency = options.concurrency.get(),
            "starting push"
        );

        let outcome = super::runtime()?.block_on(push(
            &remote_id,
            &project.local,
            &mut project.cache,
            gateway,
            &options,
        ));

        match outcome {
            Ok(report) => {
                print_report(&report);
                if report.is_noop() {
                    println!("Everything up to date.");
                } else {
                    println!("✓ Pushed to remote project '{remote_id}'");
                }
                Ok(())
            }
            Err(SyncError::Rejected { report, failures }) => {
                print_report(&report);
                for failure in &failures {
                    eprintln!("{} {failure}", "✗".red());
                }
                bail!("{} remote operation(s) rejected", failures.len())
            }
            Err(SyncError::Aborted { failures, source }) => {
                for failure in &failures {
                    eprintln!("{} {failure}", "✗".red());
                }
                Err(anyhow::Error::new(*source)).context("push aborted")
            }
            Err(err) => Err(err).context("push failed"),
        }
    }
}

fn print_report(report: &PushReport) {
    if report.config_applied {
        println!("  configuration   patched");
    }
    let rows = [
        ("migrations", &report.migrations),
        ("functions", &report.functions),
        ("function files", &report.function_files),
        ("workflows", &report.workflows),
    ];
    for (label, counts) in rows {
        if counts.applied() + counts.failed > 0 {
            println!("  {label:<15} {}", summarize(counts));
        }
    }
}

fn summarize(counts: &CategoryReport) -> String {
    let mut line = format!(
        "{} created, {} updated, {} deleted",
        counts.created, counts.updated, counts.deleted
    );
    if counts.failed > 0 {
        line.push_str(&format!(", {}", format!("{} failed", counts.failed).red()));
    }
    line
}
