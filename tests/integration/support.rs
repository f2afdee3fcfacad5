// Shared helpers for the integration tests

use std::path::{Path, PathBuf};
use std::time::Duration;

use oramon::core::monitor::{
    HistoryStore, JsonlSinkFactory, MetricRegistry, Monitor, MonitorSettings, SinkFactory,
};
use oramon::platform::FixtureConnection;

pub fn demo_fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("demo.json")
}

/// Scripted connection answering every built-in metric
pub fn demo_connection() -> FixtureConnection {
    FixtureConnection::load(&demo_fixture_path()).unwrap()
}

pub fn settings() -> MonitorSettings {
    MonitorSettings {
        interval: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Idle monitor logging under `dir` with its history in `dir/history.db`
pub fn monitor_in(dir: &Path, settings: MonitorSettings) -> Monitor {
    let sinks = JsonlSinkFactory::new(dir);
    let registry = MetricRegistry::with_default_metrics(&sinks).unwrap();
    monitor_with(dir, registry, settings)
}

pub fn monitor_with(dir: &Path, registry: MetricRegistry, settings: MonitorSettings) -> Monitor {
    let sinks = JsonlSinkFactory::new(dir);
    let store = HistoryStore::open(&dir.join("history.db")).unwrap();
    Monitor::new(registry, store, sinks.open("alerts").unwrap(), settings).unwrap()
}
