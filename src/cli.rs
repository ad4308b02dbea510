//! CLI definitions for the DBOS executor.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// DBOS executor CLI.
#[derive(Parser)]
#[command(name = "dbos")]
#[command(about = "Durable workflow executor")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/dbos.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the dispatcher and admin server in foreground (default)
    Run {
        /// Admin server host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Admin server port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Dispatcher tick interval in milliseconds (overrides config)
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// List PENDING workflows owned by the given executors
    Pending {
        /// Executor ids
        #[arg(required = true)]
        executor_ids: Vec<String>,
    },

    /// Validate the configuration file
    CheckConfig,
}
