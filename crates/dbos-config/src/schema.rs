//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable carrying this process's executor identifier.
pub const ENV_EXECUTOR_ID: &str = "DBOS__VMID";
/// Environment variable carrying the application id.
pub const ENV_APP_ID: &str = "DBOS__APPID";
/// Environment variable carrying the application version.
pub const ENV_APP_VERSION: &str = "DBOS__APPVERSION";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Queue declarations, registered in file order.
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

/// Identity stamped onto workflows this executor starts or claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_id")]
    pub executor_id: String,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub app_version: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            executor_id: default_executor_id(),
            app_id: String::new(),
            app_version: String::new(),
        }
    }
}

fn default_executor_id() -> String {
    "local".to_string()
}

impl ExecutorConfig {
    /// Apply `DBOS__VMID`, `DBOS__APPID` and `DBOS__APPVERSION` from the
    /// process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by the `DBOS__*` names.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(id) = lookup(ENV_EXECUTOR_ID) {
            self.executor_id = id;
        }
        if let Some(app_id) = lookup(ENV_APP_ID) {
            self.app_id = app_id;
        }
        if let Some(version) = lookup(ENV_APP_VERSION) {
            self.app_version = version;
        }
        self
    }
}

/// System database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path. `None` keeps the store in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl DatabaseConfig {
    /// Database path with `~` expanded.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .as_ref()
            .map(|p| PathBuf::from(crate::ConfigLoader::expand_path(&p.to_string_lossy())))
    }
}

/// Base directory for local state (`~/.dbos`).
pub fn dbos_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dbos")
}

/// Admin server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_admin_host")]
    pub host: String,

    #[serde(default = "default_admin_port")]
    pub port: u16,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_admin_host(),
            port: default_admin_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    3001
}

/// Dispatcher loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

/// A declared queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,

    /// Maximum workflows of this queue in `PENDING` across all executors.
    #[serde(default)]
    pub concurrency: Option<u32>,

    #[serde(default)]
    pub limiter: Option<RateLimitConfig>,
}

/// At most `limit` starts within any trailing `period` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub period: f64,
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
