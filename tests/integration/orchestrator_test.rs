// Monitor state machine and connectivity loss

use std::sync::Arc;
use std::time::Duration;

use oramon::core::monitor::{
    MetricRegistry, MonitorSettings, MonitorState, Presenter, SqlValue, TickHistory, TickReport,
};
use oramon::platform::FixtureConnection;
use oramon::OramonError;
use parking_lot::Mutex;
use tempfile::TempDir;

use super::support::{demo_connection, monitor_in, settings};

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl Presenter for Recorder {
    fn on_tick(&mut self, _registry: &MetricRegistry, report: &TickReport, _history: &TickHistory) {
        self.events.lock().push(format!("tick:{}", report.bundle.len()));
    }

    fn on_connectivity_lost(&mut self, _reason: &str) {
        self.events.lock().push("lost".to_string());
    }

    fn on_state_change(&mut self, state: MonitorState) {
        self.events.lock().push(format!("state:{:?}", state));
    }
}

#[test]
fn test_invalid_interval_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let sinks = oramon::core::monitor::JsonlSinkFactory::new(temp_dir.path());
    let registry = MetricRegistry::with_default_metrics(&sinks).unwrap();
    let store = oramon::core::monitor::HistoryStore::open_in_memory().unwrap();
    let alert_sink = oramon::core::monitor::SinkFactory::open(&sinks, "alerts").unwrap();
    let settings = MonitorSettings {
        interval: Duration::from_secs(3),
        ..Default::default()
    };
    let result = oramon::Monitor::new(registry, store, alert_sink, settings);
    assert!(matches!(result, Err(OramonError::Config(_))));
}

#[test]
fn test_start_requires_connection() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    assert!(matches!(monitor.start(), Err(OramonError::NotConnected)));
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert!(matches!(monitor.tick(), Err(OramonError::InvalidState(_))));
}

#[test]
fn test_start_stop_transitions() {
    let temp_dir = TempDir::new().unwrap();
    let recorder = Recorder::default();
    let mut monitor = monitor_in(temp_dir.path(), settings()).with_presenter(Box::new(recorder.clone()));
    monitor.attach(Box::new(demo_connection()));

    monitor.start().unwrap();
    assert!(monitor.is_active());
    monitor.tick().unwrap();
    monitor.stop();
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert!(monitor.tick().is_err());
    // manual collection still works while idle
    monitor.collect_now().unwrap();

    assert_eq!(
        recorder.events(),
        vec!["state:Active", "tick:12", "state:Idle", "tick:12"]
    );
}

#[test]
fn test_lost_connection_between_ticks() {
    let temp_dir = TempDir::new().unwrap();
    let recorder = Recorder::default();
    let mut monitor = monitor_in(temp_dir.path(), settings()).with_presenter(Box::new(recorder.clone()));

    let conn = demo_connection();
    let switch = conn.kill_switch();
    monitor.attach(Box::new(conn));
    monitor.start().unwrap();
    assert!(!monitor.tick().unwrap().connection_lost);

    switch.kill();
    let report = monitor.tick().unwrap();
    assert!(report.connection_lost);
    // collection stopped at the first metric
    assert_eq!(report.bundle.len(), 1);
    assert_eq!(report.bundle.collected_count(), 0);

    assert_eq!(monitor.state(), MonitorState::Idle);
    assert!(!monitor.is_connected());
    assert!(matches!(monitor.collect_now(), Err(OramonError::NotConnected)));
    assert!(recorder.events().ends_with(&["state:Idle".to_string(), "lost".to_string()]));
    assert!(monitor.history().latest().unwrap().connection_lost);
}

#[test]
fn test_lost_connection_mid_tick() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    let conn = FixtureConnection::default()
        .with_rows("v$statname", vec![vec![SqlValue::Int(12)]])
        .with_rows("COUNT(DISTINCT s.sid)", vec![vec![SqlValue::Int(1); 7]])
        .with_disconnect("stat.statistic# IN (:stat_logical, :stat_cpu)");
    monitor.attach(Box::new(conn));
    monitor.start().unwrap();

    let report = monitor.tick().unwrap();
    assert!(report.connection_lost);
    assert!(report.bundle.get("SessionOverview").is_some());
    assert_eq!(report.bundle.entry("TopSessions"), Some(None));
    assert!(!report.bundle.contains("BlockingSessions"));
    assert_eq!(monitor.state(), MonitorState::Idle);
}

#[test]
fn test_start_with_dead_connection() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    let conn = FixtureConnection::default();
    conn.kill();
    monitor.attach(Box::new(conn));

    assert!(matches!(monitor.start(), Err(OramonError::ConnectionLost(_))));
    assert!(!monitor.is_connected());
}

#[test]
fn test_set_interval_bounds() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    assert!(monitor.set_interval(Duration::from_secs(300)).is_ok());
    assert!(monitor.set_interval(Duration::from_secs(301)).is_err());
    assert_eq!(monitor.interval(), Duration::from_secs(300));
}

#[test]
fn test_history_tracks_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));
    monitor.collect_now().unwrap();
    monitor.collect_now().unwrap();

    let history = monitor.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.latest().unwrap().total_sessions, Some(120.0));
    assert_eq!(history.session_delta(), Some(0.0));
}
