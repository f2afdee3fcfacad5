use std::fs;
use std::time::Duration;

use oramon::core::config::Config;
use oramon::core::monitor::AlertPolicy;
use tempfile::TempDir;

#[test]
fn test_config_load_nonexistent_returns_default() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_from(&temp_dir.path().join("missing.json")).unwrap();
    assert_eq!(config.monitoring, Config::default().monitoring);
    assert_eq!(config.database.port, 1521);
}

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.database.host = "db01.internal".to_string();
    config.database.username = "monitor".to_string();
    config.monitoring.interval_seconds = 15;
    config.monitoring.alert_policy = AlertPolicy::OnChange;
    config.monitoring.disabled_metrics = vec!["HostMetrics".to_string()];
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.database.host, "db01.internal");
    assert_eq!(loaded.monitoring, config.monitoring);
}

#[test]
fn test_config_invalid_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_config_out_of_range_interval_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"monitoring": {"interval_seconds": 600}}"#).unwrap();
    let err = Config::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("Interval"));
}

#[test]
fn test_config_negative_threshold_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"monitoring": {"alert_thresholds": {"max_tablespace_pct": -1}}}"#,
    )
    .unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_settings_from_config() {
    let mut config = Config::default();
    config.monitoring.interval_seconds = 10;
    config.monitoring.row_limit = 5;
    let settings = config.monitoring.settings();
    assert_eq!(settings.interval, Duration::from_secs(10));
    assert_eq!(settings.collect.limit_or(20), 5);
    assert_eq!(settings.thresholds.max_sessions, 500.0);
}

#[test]
fn test_resolve_path_prefers_explicit() {
    let temp_dir = TempDir::new().unwrap();
    let explicit = temp_dir.path().join("custom.json");
    assert_eq!(Config::resolve_path(Some(&explicit)).unwrap(), explicit);
}
