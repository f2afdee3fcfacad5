// Offline aggregation of the TopSessions log written by real ticks

use std::fs::OpenOptions;
use std::io::Write;

use oramon::core::analysis::{GroupBy, SessionLog};
use tempfile::TempDir;

use super::support::{demo_connection, monitor_in, settings};

#[test]
fn test_session_log_aggregates_ticks() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));
    monitor.collect_now().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    monitor.collect_now().unwrap();
    monitor.close();

    let path = temp_dir.path().join("topsessions.jsonl");
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "not json").unwrap();
    drop(file);

    let log = SessionLog::load(&path).unwrap();
    assert_eq!(log.records(), 2);
    assert_eq!(log.skipped_lines(), 1);
    assert_eq!(log.sessions().len(), 3);

    let top = log.top_by_cpu(1);
    assert_eq!(top[0].sid, 214);
    assert_eq!(top[0].samples, 2);
    assert!((top[0].cpu_seconds - 245.4).abs() < 1e-9);
    assert_eq!(log.top_by_reads(1)[0].sid, 101);

    let groups = log.group_by(GroupBy::User, 10);
    let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["BATCH", "APP", "SCOTT"]);
    assert!(groups.iter().all(|g| g.samples == 2));
}

#[test]
fn test_missing_log_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(SessionLog::load(&temp_dir.path().join("topsessions.jsonl")).is_err());
}
