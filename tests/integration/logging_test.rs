// JSONL logging: one line per collected metric per tick

use std::fs;

use oramon::core::monitor::sink::read_jsonl;
use oramon::core::monitor::{
    CollectOptions, JsonlSinkFactory, LogRecord, MetricRegistry, SqlValue,
};
use oramon::platform::FixtureConnection;
use serde_json::Value;
use tempfile::TempDir;

use super::support::{demo_connection, monitor_in, settings};

#[test]
fn test_log_records_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let sinks = JsonlSinkFactory::new(temp_dir.path());
    let registry = MetricRegistry::with_default_metrics(&sinks).unwrap();

    let conn = demo_connection();
    let bundle = registry.collect_all(&conn, &CollectOptions::default());
    let written = registry.log_all(&bundle, "2026-10-16T09:00:00.000Z");
    assert_eq!(written, bundle.collected_count());

    let records: Vec<LogRecord> =
        read_jsonl(&sinks.path_for("SessionOverview")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metric, "SessionOverview");
    assert_eq!(records[0].sample_id, "2026-10-16T09:00:00.000Z");
    assert_eq!(records[0].data.get_f64("total_sessions"), Some(120.0));
    assert_eq!(&records[0].data, bundle.get("SessionOverview").unwrap());
}

#[test]
fn test_full_precision_floats_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let sinks = JsonlSinkFactory::new(temp_dir.path());
    let registry = MetricRegistry::with_default_metrics(&sinks).unwrap();

    let values = [39.430133835633676, 18.233521453552402, 98.56906946328695, 21.291890726713458];
    let rows = values
        .iter()
        .enumerate()
        .map(|(i, pct)| {
            vec![
                SqlValue::Text(format!("TS{}", i)),
                SqlValue::Text("PERMANENT".into()),
                SqlValue::Text("ONLINE".into()),
                SqlValue::Float(pct * 10.0 / 3.0),
                SqlValue::Float(1000.0 / 3.0),
                SqlValue::Float(2000.0 / 7.0),
                SqlValue::Float(1.0 / 3.0),
                SqlValue::Float(*pct),
                SqlValue::Float(0.1 + 0.2),
                SqlValue::Int(1),
                SqlValue::Int(0),
                SqlValue::Int(0),
            ]
        })
        .collect();
    let conn = FixtureConnection::default().with_rows("dba_tablespaces", rows);

    let bundle = registry.collect_all(&conn, &CollectOptions::default());
    let original = bundle.get("TablespaceUsage").unwrap();
    registry.log_all(&bundle, "s1");

    let records: Vec<LogRecord> = read_jsonl(&sinks.path_for("TablespaceUsage")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0].data, original);

    let logged: Vec<f64> = records[0]
        .data
        .list("tablespaces")
        .unwrap()
        .iter()
        .map(|t| t["pct_used"].as_f64().unwrap())
        .collect();
    assert_eq!(logged, values.to_vec());
}

#[test]
fn test_each_tick_appends() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    let first = monitor.collect_now().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = monitor.collect_now().unwrap();
    monitor.close();

    let path = temp_dir.path().join("tablespaceusage.jsonl");
    let records: Vec<LogRecord> = read_jsonl(&path).unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.sample_id.as_str()).collect();
    assert_eq!(ids, vec![first.sample_id.as_str(), second.sample_id.as_str()]);
}

#[test]
fn test_empty_results_write_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let sinks = JsonlSinkFactory::new(temp_dir.path());
    let registry = MetricRegistry::with_default_metrics(&sinks).unwrap();

    // nothing matches, every database metric fails
    let conn = FixtureConnection::default();
    let bundle = registry.collect_all(&conn, &CollectOptions::default());
    registry.log_all(&bundle, "s1");

    let content = fs::read_to_string(sinks.path_for("TopSessions")).unwrap();
    assert!(content.is_empty());
    let host = fs::read_to_string(sinks.path_for("HostMetrics")).unwrap();
    assert_eq!(host.lines().count(), 1);
}

#[test]
fn test_alert_log_format() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));
    let report = monitor.collect_now().unwrap();
    monitor.close();

    let records: Vec<Value> = read_jsonl(&temp_dir.path().join("alerts.jsonl")).unwrap();
    assert_eq!(records.len(), report.alerts.len());

    let users = records
        .iter()
        .find(|r| r["details"]["subject"] == "USERS")
        .unwrap();
    assert_eq!(users["type"], "alert");
    assert_eq!(users["alert_type"], "warning");
    assert_eq!(users["details"]["metric"], "TablespaceUsage");
    assert_eq!(users["details"]["value"], 92.0);
    assert_eq!(users["details"]["threshold"], 90.0);
    assert!(users["timestamp"].is_string());
}
