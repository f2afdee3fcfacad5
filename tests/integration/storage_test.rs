// SQLite history: idempotent initialization, append-only inserts

use oramon::core::monitor::{JsonlSinkFactory, MetricRegistry};
use tempfile::TempDir;

use super::support::{demo_connection, monitor_in, monitor_with, settings};

#[test]
fn test_initialization_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let tables = {
        let monitor = monitor_in(temp_dir.path(), settings());
        monitor.store().tables().unwrap()
    };
    let monitor = monitor_in(temp_dir.path(), settings());
    assert_eq!(monitor.store().tables().unwrap(), tables);
    assert!(tables.contains(&"session_overview_history".to_string()));
    assert!(tables.contains(&"host_metrics_history".to_string()));
}

#[test]
fn test_disabled_metrics_still_get_tables() {
    let temp_dir = TempDir::new().unwrap();
    let sinks = JsonlSinkFactory::new(temp_dir.path());
    let mut registry = MetricRegistry::with_default_metrics(&sinks).unwrap();
    registry.apply_disabled(&["TablespaceUsage".to_string()]).unwrap();

    let monitor = monitor_with(temp_dir.path(), registry, settings());
    let tables = monitor.store().tables().unwrap();
    assert!(tables.contains(&"tablespace_usage_history".to_string()));
    assert_eq!(monitor.store().row_count("tablespace_usage_history").unwrap(), 0);
}

#[test]
fn test_ticks_append_rows() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    let first = monitor.collect_now().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = monitor.collect_now().unwrap();
    assert!(first.rows_stored > 0);
    assert_eq!(first.rows_stored, second.rows_stored);

    let store = monitor.store();
    // three tablespaces and two resources per tick
    assert_eq!(store.row_count("tablespace_usage_history").unwrap(), 6);
    assert_eq!(store.row_count("resource_limits_history").unwrap(), 4);
    assert_eq!(store.row_count("session_overview_history").unwrap(), 2);
    assert_eq!(
        store.sample_ids("session_overview_history").unwrap(),
        vec![first.sample_id, second.sample_id]
    );
}

#[test]
fn test_history_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut monitor = monitor_in(temp_dir.path(), settings());
        monitor.attach(Box::new(demo_connection()));
        monitor.collect_now().unwrap();
    }
    let monitor = monitor_in(temp_dir.path(), settings());
    assert_eq!(monitor.store().row_count("wait_events_history").unwrap(), 3);
}

#[test]
fn test_history_reads_back_newest_first() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    let first = monitor.collect_now().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = monitor.collect_now().unwrap();

    let store = monitor.store();
    let users = store
        .recent_where("tablespace_usage_history", "tablespace", "USERS", 10)
        .unwrap();
    let ids: Vec<&str> = users
        .column("sample_id")
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.sample_id.as_str(), first.sample_id.as_str()]);
    assert_eq!(users.to_records()[0]["pct_used"], 92.0);

    let latest = store.recent("tablespace_usage_history", 2).unwrap();
    assert!(latest
        .column("sample_id")
        .iter()
        .all(|v| v.as_str() == Some(second.sample_id.as_str())));

    assert_eq!(
        store
            .distinct_values("tablespace_usage_history", "tablespace")
            .unwrap(),
        vec!["SYSAUX", "SYSTEM", "USERS"]
    );
}
