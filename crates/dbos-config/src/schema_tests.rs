use super::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.executor.executor_id, "local");
    assert!(config.database.path.is_none());
    assert!(config.admin.enabled);
    assert_eq!(config.admin.port, 3001);
    assert_eq!(config.dispatcher.tick_interval_ms, 1000);
    assert!(config.queues.is_empty());
}

#[test]
fn test_executor_overrides() {
    let executor = ExecutorConfig::default().with_overrides(|key| match key {
        ENV_EXECUTOR_ID => Some("testexecutor".to_string()),
        ENV_APP_VERSION => Some("testversion".to_string()),
        _ => None,
    });
    assert_eq!(executor.executor_id, "testexecutor");
    assert_eq!(executor.app_id, "");
    assert_eq!(executor.app_version, "testversion");
}

#[test]
fn test_executor_no_overrides() {
    let executor = ExecutorConfig {
        executor_id: "vm-1".to_string(),
        app_id: "app".to_string(),
        app_version: "v1".to_string(),
    };
    let same = executor.clone().with_overrides(|_| None);
    assert_eq!(same, executor);
}

#[test]
fn test_queue_config_roundtrip() {
    let queue = QueueConfig {
        name: "q".to_string(),
        concurrency: Some(2),
        limiter: Some(RateLimitConfig { limit: 3, period: 1.5 }),
    };
    let text = toml::to_string(&queue).unwrap();
    let parsed: QueueConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, queue);
}

#[test]
fn test_database_config_default_busy_timeout() {
    let database: DatabaseConfig = toml::from_str("path = \"x.sqlite\"").unwrap();
    assert_eq!(database.busy_timeout_ms, 5000);
}

#[test]
fn test_database_resolved_path() {
    let database = DatabaseConfig {
        path: Some(PathBuf::from("~/state/dbos.sqlite")),
        ..Default::default()
    };
    let resolved = database.resolved_path().unwrap();
    assert!(!resolved.to_string_lossy().starts_with('~'));
    assert!(resolved.ends_with("state/dbos.sqlite"));

    assert!(DatabaseConfig::default().resolved_path().is_none());
}

#[test]
fn test_dbos_home() {
    assert!(dbos_home().ends_with(".dbos"));
}
