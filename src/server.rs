//! Executor startup and shutdown.

use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dbos_api::{AdminServer, AdminServerConfig};
use dbos_config::{dbos_home, Config, ConfigError, ConfigValidator};
use dbos_workqueue::WorkflowRuntime;

use crate::signal::{shutdown_channel, wait_for_shutdown};

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.dbos/logs/ with daily rotation.
pub(crate) fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = dbos_home().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("dbos")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Validate `config`, logging warnings. Fails on the first error.
pub(crate) fn validate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let warnings = ConfigValidator::validate(config)?.into_result()?;
    for warning in warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    Ok(())
}

/// Validate `config` and render one line per warning and error.
///
/// Returns the lines and the number of errors.
pub(crate) fn check_config(config: &Config) -> Result<(Vec<String>, usize), ConfigError> {
    let result = ConfigValidator::validate(config)?;
    let mut lines = Vec::with_capacity(result.warnings.len() + result.errors.len());
    for warning in &result.warnings {
        lines.push(format!("warning: {}: {}", warning.path, warning.message));
    }
    for error in &result.errors {
        lines.push(format!("error: {}: {}", error.path, error.message));
    }
    Ok((lines, result.errors.len()))
}

/// Run one executor in foreground until SIGINT or SIGTERM.
pub(crate) async fn run_executor(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    validate(&config)?;

    info!("Starting DBOS executor v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Executor id: {}, app version: {}",
        config.executor.executor_id,
        if config.executor.app_version.is_empty() {
            "<unset>"
        } else {
            config.executor.app_version.as_str()
        }
    );

    let runtime = WorkflowRuntime::from_config(&config).await?;
    let shutdown = shutdown_channel();

    let admin = if config.admin.enabled {
        let server = AdminServer::new(AdminServerConfig::from(&config.admin), runtime.recovery());
        let listener = server.bind().await?;
        let rx = shutdown.clone();
        Some(tokio::spawn(async move {
            server.serve(listener, wait_for_shutdown(rx)).await
        }))
    } else {
        info!("Admin server disabled");
        None
    };

    if runtime.hosts_workflows() {
        runtime.launch();

        // Pick up what this executor left PENDING before it last stopped
        let own = vec![config.executor.executor_id.clone()];
        match runtime.recover(&own).await {
            Ok(ids) if !ids.is_empty() => info!("Resumed {} pending workflow(s)", ids.len()),
            Ok(_) => {}
            Err(e) => error!("Failed to resume pending workflows: {}", e),
        }
    } else {
        info!("No workflow functions registered, queues are left to other executors");
    }

    wait_for_shutdown(shutdown).await;
    info!("Shutting down");

    runtime.shutdown().await;
    if let Some(handle) = admin {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Admin server error: {}", e),
            Err(e) => error!("Admin server task failed: {}", e),
        }
    }

    info!("Executor stopped");
    Ok(())
}
