//! keel: push a local project to its remote counterpart.
//!
//! # Usage
//!
//! ```text
//! keel init --remote-id <ID> [PATH]
//! keel status [PATH] [--only <categories>] [--json]
//! keel diff [PATH]
//! keel push [PATH] [--only <categories>] [--concurrency N] [--endpoint URL]
//! keel projects [--endpoint URL] [--json]
//! ```

mod commands;
mod http;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    diff::DiffArgs, init::InitArgs, projects::ProjectsArgs, push::PushArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "keel",
    version,
    about = "Reconcile a local project with its remote project",
    long_about = None,
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bind a project checkout to a remote project and record its baseline.
    Init(InitArgs),

    /// List pending changes without contacting the remote side.
    Status(StatusArgs),

    /// Show how project.json differs from the last pushed version.
    Diff(DiffArgs),

    /// Push pending changes to the remote project.
    Push(PushArgs),

    /// List remote projects.
    Projects(ProjectsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Push(args) => args.run(),
        Commands::Projects(args) => args.run(),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
