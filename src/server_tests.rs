use std::fs;

use tempfile::tempdir;

use dbos_config::ConfigLoader;

use super::*;

#[test]
fn test_check_config_accepts_valid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dbos.toml");
    fs::write(
        &path,
        r#"
[executor]
executor_id = "vm-1"

[[queues]]
name = "emails"
concurrency = 2
limiter = { limit = 10, period = 60.0 }
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(&path).unwrap();
    let (lines, errors) = check_config(&config).unwrap();
    assert!(lines.is_empty(), "unexpected report: {:?}", lines);
    assert_eq!(errors, 0);
    assert!(validate(&config).is_ok());
}

#[test]
fn test_check_config_reports_file_problems() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dbos.toml");
    fs::write(
        &path,
        r#"
[dispatcher]
tick_interval_ms = 120000

[[queues]]
name = "emails"
concurrency = 0
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(&path).unwrap();
    let (lines, errors) = check_config(&config).unwrap();
    assert_eq!(errors, 1);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("warning: dispatcher.tick_interval_ms"));
    assert_eq!(lines[1], "error: queues[0].concurrency: concurrency must be greater than 0");
    assert!(validate(&config).is_err());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let config = ConfigLoader::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert!(config.queues.is_empty());
    assert_eq!(check_config(&config).unwrap().1, 0);
}
