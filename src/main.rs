//! DBOS executor
//!
//! Hosts the queue dispatcher, recovery and the admin HTTP server for one
//! executor process.

mod cli;
mod server;
mod signal;

use clap::Parser;
use tracing::info;

use dbos_config::ConfigLoader;
use dbos_workqueue::{WorkflowRuntime, WorkflowStore};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    server::init_tracing()?;

    let cli = Cli::parse();
    let mut config = ConfigLoader::load_or_default(&cli.config)?;

    match cli.command {
        None => server::run_executor(config).await,
        Some(Commands::Run {
            host,
            port,
            tick_ms,
        }) => {
            if let Some(host) = host {
                config.admin.host = host;
            }
            if let Some(port) = port {
                config.admin.port = port;
            }
            if let Some(tick_ms) = tick_ms {
                config.dispatcher.tick_interval_ms = tick_ms;
            }
            server::run_executor(config).await
        }
        Some(Commands::Pending { executor_ids }) => {
            if config.database.path.is_none() {
                info!("No database path configured, using an empty in-memory store");
            }
            let runtime = WorkflowRuntime::from_config(&config).await?;
            let ids = runtime.store().find_pending_workflows(&executor_ids).await?;
            println!("{}", serde_json::to_string(&ids)?);
            Ok(())
        }
        Some(Commands::CheckConfig) => {
            let (lines, errors) = server::check_config(&config)?;
            for line in &lines {
                println!("{}", line);
            }
            if errors > 0 {
                return Err(format!("{} configuration error(s)", errors).into());
            }
            println!("{}: ok", cli.config.display());
            Ok(())
        }
    }
}
