// Alert evaluation over collected data, and alert policies across ticks

use std::collections::HashSet;

use oramon::core::monitor::{
    check_alerts, AlertKey, AlertPolicy, AlertSeverity, AlertThresholds, Bundle, CollectOptions,
    MemorySinkFactory, MetricRegistry,
};
use tempfile::TempDir;

use super::support::{demo_connection, monitor_in, settings};

fn demo_bundle() -> Bundle {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    registry.collect_all(&demo_connection(), &CollectOptions::default())
}

fn keys(bundle: &Bundle, thresholds: &AlertThresholds) -> HashSet<AlertKey> {
    check_alerts(bundle, thresholds)
        .iter()
        .map(|a| a.key())
        .collect()
}

#[test]
fn test_default_thresholds_on_demo_data() {
    let alerts = check_alerts(&demo_bundle(), &AlertThresholds::default());
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    assert_eq!(alerts[0].subject.as_deref(), Some("USERS"));
}

#[test]
fn test_lower_thresholds_never_remove_alerts() {
    let bundle = demo_bundle();
    let steps = [
        (600.0, 250.0, 20.0, 95.0),
        (500.0, 200.0, 10.0, 90.0),
        (120.0, 35.0, 2.0, 87.0),
        (50.0, 10.0, 1.0, 50.0),
    ];

    let mut previous: HashSet<AlertKey> = HashSet::new();
    for (sessions, active, blocked, pct) in steps {
        let thresholds = AlertThresholds {
            max_sessions: sessions,
            max_active_sessions: active,
            max_blocked_sessions: blocked,
            max_tablespace_pct: pct,
        };
        let current = keys(&bundle, &thresholds);
        assert!(previous.is_subset(&current));
        previous = current;
    }
    // every session counter and all three tablespaces at the lowest setting
    assert_eq!(previous.len(), 6);
}

#[test]
fn test_threshold_is_inclusive() {
    let thresholds = AlertThresholds {
        max_sessions: 120.0,
        ..Default::default()
    };
    let alerts = check_alerts(&demo_bundle(), &thresholds);
    assert!(alerts.iter().any(|a| a.field == "total_sessions"));
}

#[test]
fn test_blocked_sessions_are_critical() {
    let thresholds = AlertThresholds {
        max_blocked_sessions: 2.0,
        ..Default::default()
    };
    let alerts = check_alerts(&demo_bundle(), &thresholds);
    let blocked = alerts
        .iter()
        .find(|a| a.field == "blocked_sessions")
        .unwrap();
    assert_eq!(blocked.severity, AlertSeverity::Critical);
}

#[test]
fn test_tablespace_escalates_to_critical() {
    let thresholds = AlertThresholds {
        max_tablespace_pct: 85.0,
        ..Default::default()
    };
    let alerts = check_alerts(&demo_bundle(), &thresholds);
    let severity = |name: &str| {
        alerts
            .iter()
            .find(|a| a.subject.as_deref() == Some(name))
            .map(|a| a.severity)
    };
    assert_eq!(severity("USERS"), Some(AlertSeverity::Critical));
    assert_eq!(severity("SYSTEM"), Some(AlertSeverity::Warning));
    assert_eq!(severity("SYSAUX"), Some(AlertSeverity::Warning));
}

#[test]
fn test_every_tick_policy_repeats() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    assert_eq!(monitor.collect_now().unwrap().alerts.len(), 1);
    assert_eq!(monitor.collect_now().unwrap().alerts.len(), 1);
}

#[test]
fn test_on_change_policy_suppresses_repeats() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = settings();
    settings.alert_policy = AlertPolicy::OnChange;
    let mut monitor = monitor_in(temp_dir.path(), settings);
    monitor.attach(Box::new(demo_connection()));

    assert_eq!(monitor.collect_now().unwrap().alerts.len(), 1);
    assert!(monitor.collect_now().unwrap().alerts.is_empty());
    assert_eq!(monitor.history().latest().unwrap().alerts, 0);
}
