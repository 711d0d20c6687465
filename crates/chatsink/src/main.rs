// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatsink - chat webhook ingestion service.
//!
//! This is the binary entry point: the webhook gateway, the ingestion
//! workers, and operator commands for the durable queue.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod jobs;
mod serve;
mod shutdown;

use std::path::PathBuf;

use chatsink_config::model::ChatsinkConfig;
use chatsink_core::JobStatus;
use clap::{Parser, Subcommand};

use crate::serve::Components;

/// Chatsink - chat webhook ingestion service.
#[derive(Parser, Debug)]
#[command(name = "chatsink", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook gateway and the ingestion workers.
    Serve,
    /// Run only the webhook gateway.
    Gateway,
    /// Run only the ingestion workers.
    Worker,
    /// Inspect and manage queued jobs.
    Jobs {
        #[command(subcommand)]
        action: JobsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// List jobs, newest first.
    List {
        /// Only show jobs in this state (pending, processing, completed, failed).
        #[arg(long)]
        status: Option<JobStatus>,
        /// Maximum number of jobs to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Re-queue a failed job with a fresh attempt budget.
    Replay {
        /// Job id.
        id: i64,
    },
    /// Show job counts per state.
    Stats {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());

    let result = match cli.command {
        Some(Commands::Serve) => {
            require_store_credentials(&config);
            serve::run_serve(config, Components::All).await
        }
        Some(Commands::Gateway) => serve::run_serve(config, Components::GatewayOnly).await,
        Some(Commands::Worker) => {
            require_store_credentials(&config);
            serve::run_serve(config, Components::WorkersOnly).await
        }
        Some(Commands::Jobs { action }) => match action {
            JobsCommand::List {
                status,
                limit,
                json,
            } => jobs::run_list(&config, status, limit, json).await,
            JobsCommand::Replay { id } => jobs::run_replay(&config, id).await,
            JobsCommand::Stats { json } => jobs::run_stats(&config, json).await,
        },
        None => {
            println!("chatsink: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Load and validate configuration, exiting with rendered diagnostics on error.
fn load_config(path: Option<&std::path::Path>) -> ChatsinkConfig {
    let loaded = match path {
        Some(path) => chatsink_config::load_and_validate_path(path),
        None => chatsink_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            chatsink_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Workers cannot start without store credentials.
fn require_store_credentials(config: &ChatsinkConfig) {
    if let Err(errors) = chatsink_config::require_store_credentials(config) {
        chatsink_config::render_errors(&errors);
        std::process::exit(1);
    }
}
