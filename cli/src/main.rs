//! PortKill CLI - Find and stop processes on network ports
//!
//! A command-line tool for listing the processes bound to a port and
//! terminating them, with a graceful-then-forceful kill policy.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use portkill_core::{ConfigStore, PortKillerEngine};

#[derive(Parser)]
#[command(name = "portkill")]
#[command(author, version, about = "Find and stop processes on network ports")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Force kill (SIGKILL) without graceful shutdown
    #[arg(short, long, global = true)]
    force: bool,

    /// Read configuration from this file instead of ~/.portkiller/config.json
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the common development ports
    Ports,

    /// List processes listening on a port
    #[command(alias = "ls")]
    List {
        /// Port number to inspect
        port: u16,
    },

    /// Kill processes by PID
    Kill {
        /// PIDs to kill
        #[arg(required = true)]
        pids: Vec<String>,
    },

    /// Kill whatever listens on a port, after confirmation
    Free {
        /// Port number to free
        port: u16,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Kill everything listening on the common development ports
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let store = match &cli.config {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::new()?,
    };
    let mut config = store
        .load()
        .await
        .with_context(|| format!("loading {}", store.path().display()))?;
    if cli.force {
        config.kill.force = true;
    }
    tracing::debug!(path = %store.path().display(), force = config.kill.force, "Configuration loaded");

    let engine = PortKillerEngine::with_config(config);

    match cli.command {
        Commands::Ports => commands::ports::run(&engine, cli.json),
        Commands::List { port } => commands::list::run(&engine, port, cli.json).await,
        Commands::Kill { pids } => commands::kill::run(&engine, &pids, cli.json).await,
        Commands::Free { port, yes } => commands::free::run(&engine, port, yes, cli.json).await,
        Commands::Clear { yes } => commands::clear::run(&engine, yes, cli.json).await,
    }
}
