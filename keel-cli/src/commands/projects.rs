//! `keel projects`: remote projects visible to the caller.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, info};

use keel_sync::{Paginator, ProjectListing, RemoteProject};

use crate::http::HttpGateway;

/// Arguments for `keel projects`.
#[derive(Args, Debug)]
pub struct ProjectsArgs {
    /// Base URL of the remote API.
    #[arg(long, env = "KEEL_ENDPOINT")]
    pub endpoint: String,

    /// Stop after this many projects.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
}

impl ProjectsArgs {
    pub fn run(self) -> Result<()> {
        let gateway = HttpGateway::from_env(&self.endpoint);
        let limit = self.limit.unwrap_or(usize::MAX);
        info!(endpoint = %self.endpoint, limit = ?self.limit, "listing remote projects");

        let projects = super::runtime()?.block_on(async {
            let mut pages = Paginator::new(ProjectListing::new(&gateway));
            let mut projects: Vec<RemoteProject> = Vec::new();
            while projects.len() < limit {
                match pages.next_page().await? {
                    Some(page) => {
                        debug!(size = page.len(), "received page");
                        projects.extend(page);
                    }
                    None => break,
                }
            }
            projects.truncate(limit);
            Ok::<_, keel_sync::RemoteError>(projects)
        });
        let projects = projects.context("failed to list remote projects")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&projects).context("failed to serialize projects")?
            );
            return Ok(());
        }

        if projects.is_empty() {
            println!("No remote projects.");
            return Ok(());
        }
        let rows: Vec<ProjectRow> = projects
            .into_iter()
            .map(|p| ProjectRow {
                id: p.id.to_string(),
                name: p.name,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
