//! Collection orchestrator.
//!
//! [`Monitor`] owns everything one monitoring session needs and runs ticks:
//! collect, evaluate alerts, log, store, record history, notify the
//! presenter. It has two states. `Active` means a live connection and
//! interval collection running; `Idle` covers everything else.

use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::alerts::{check_alerts, record_alerts, Alert, AlertPolicy, AlertThresholds, AlertTracker};
use super::connection::Connection;
use super::history::{TickHistory, TickSummary};
use super::metric::CollectOptions;
use super::registry::{Bundle, MetricRegistry};
use super::sink::LogSink;
use super::storage::HistoryStore;
use crate::error::{OramonError, Result};

pub const MIN_INTERVAL_SECS: u64 = 5;
pub const MAX_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Active,
}

/// Validate a poll interval against the allowed range
pub fn validate_interval(interval: Duration) -> Result<Duration> {
    let secs = interval.as_secs();
    if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) || interval.subsec_nanos() != 0 {
        return Err(OramonError::config(format!(
            "Interval must be a whole number of seconds between {} and {}, got {:?}",
            MIN_INTERVAL_SECS, MAX_INTERVAL_SECS, interval
        )));
    }
    Ok(interval)
}

/// Tunables of a monitoring session
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub collect: CollectOptions,
    pub thresholds: AlertThresholds,
    pub alert_policy: AlertPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            collect: CollectOptions::default(),
            thresholds: AlertThresholds::default(),
            alert_policy: AlertPolicy::default(),
        }
    }
}

/// Everything one tick produced
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub sample_id: String,
    pub bundle: Bundle,
    /// Alerts emitted after the alert policy was applied
    pub alerts: Vec<Alert>,
    pub records_logged: usize,
    pub rows_stored: usize,
    pub connection_lost: bool,
    pub elapsed_ms: u128,
}

/// Presentation layer callbacks. All methods have no-op defaults.
pub trait Presenter: Send {
    fn on_tick(&mut self, _registry: &MetricRegistry, _report: &TickReport, _history: &TickHistory) {}

    fn on_connectivity_lost(&mut self, _reason: &str) {}

    fn on_state_change(&mut self, _state: MonitorState) {}
}

/// Presenter that ignores every callback
pub struct NullPresenter;

impl Presenter for NullPresenter {}

pub struct Monitor {
    registry: MetricRegistry,
    store: HistoryStore,
    alert_sink: Box<dyn LogSink>,
    tracker: AlertTracker,
    settings: MonitorSettings,
    history: TickHistory,
    conn: Option<Box<dyn Connection>>,
    state: MonitorState,
    presenter: Box<dyn Presenter>,
}

impl Monitor {
    /// Build an idle monitor. Storage is initialized here for every unit,
    /// whether enabled or not.
    pub fn new(
        registry: MetricRegistry,
        store: HistoryStore,
        alert_sink: Box<dyn LogSink>,
        settings: MonitorSettings,
    ) -> Result<Self> {
        validate_interval(settings.interval)?;
        let failures = registry.init_storage(&store);
        if failures > 0 {
            log::warn!("Storage initialization failed for {} metric(s)", failures);
        }
        Ok(Self {
            registry,
            store,
            alert_sink,
            tracker: AlertTracker::new(settings.alert_policy),
            settings,
            history: TickHistory::new(),
            conn: None,
            state: MonitorState::Idle,
            presenter: Box::new(NullPresenter),
        })
    }

    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == MonitorState::Active
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.settings.interval
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn history(&self) -> &TickHistory {
        &self.history
    }

    /// Hand over a live connection. The monitor stays idle until `start`.
    pub fn attach(&mut self, conn: Box<dyn Connection>) {
        log::info!("Connected to {}", conn.describe());
        self.conn = Some(conn);
    }

    /// Idle -> Active. Requires a live connection.
    pub fn start(&mut self) -> Result<()> {
        let conn = self.conn.as_deref().ok_or(OramonError::NotConnected)?;
        if !conn.is_alive() {
            let reason = format!("{} is not reachable", conn.describe());
            self.drop_connection(&reason);
            return Err(OramonError::connection_lost(reason));
        }
        if self.state != MonitorState::Active {
            log::info!("Monitoring started (interval {}s)", self.settings.interval.as_secs());
            self.set_state(MonitorState::Active);
        }
        Ok(())
    }

    /// Active -> Idle. Takes effect between ticks.
    pub fn stop(&mut self) {
        if self.state == MonitorState::Active {
            log::info!("Monitoring stopped");
            self.set_state(MonitorState::Idle);
        }
    }

    /// Stop and release the connection
    pub fn disconnect(&mut self) {
        self.stop();
        if let Some(conn) = self.conn.take() {
            log::info!("Disconnected from {}", conn.describe());
        }
        self.tracker.reset();
    }

    pub fn set_interval(&mut self, interval: Duration) -> Result<()> {
        self.settings.interval = validate_interval(interval)?;
        log::info!("Interval set to {}s", interval.as_secs());
        Ok(())
    }

    /// One out-of-band tick, allowed in either state while connected
    pub fn collect_now(&mut self) -> Result<TickReport> {
        self.run_tick()
    }

    /// Scheduled tick; only valid while active
    pub fn tick(&mut self) -> Result<TickReport> {
        if self.state != MonitorState::Active {
            return Err(OramonError::invalid_state("monitor is idle"));
        }
        self.run_tick()
    }

    fn run_tick(&mut self) -> Result<TickReport> {
        let started = Instant::now();
        let conn = self.conn.as_deref().ok_or(OramonError::NotConnected)?;
        let target = conn.describe();
        let sample_id = new_sample_id();

        let bundle = self.registry.collect_all(conn, &self.settings.collect);

        let alerts = self
            .tracker
            .apply(check_alerts(&bundle, &self.settings.thresholds));
        if let Err(e) = record_alerts(self.alert_sink.as_ref(), &alerts) {
            log::error!("Failed to write alert log: {}", e);
        }

        let records_logged = self.registry.log_all(&bundle, &sample_id);
        let rows_stored = self.registry.store_all(&mut self.store, &bundle, &sample_id);

        self.history.push(TickSummary::from_bundle(
            &sample_id,
            &bundle,
            alerts.len(),
            rows_stored,
        ));

        let report = TickReport {
            connection_lost: bundle.connection_lost(),
            sample_id,
            bundle,
            alerts,
            records_logged,
            rows_stored,
            elapsed_ms: started.elapsed().as_millis(),
        };
        log::debug!(
            "Tick {}: {} metric(s), {} alert(s), {} row(s) in {} ms",
            report.sample_id,
            report.bundle.collected_count(),
            report.alerts.len(),
            report.rows_stored,
            report.elapsed_ms
        );

        self.presenter.on_tick(&self.registry, &report, &self.history);
        if report.connection_lost {
            self.drop_connection(&format!("Lost connection to {}", target));
        }
        Ok(report)
    }

    fn drop_connection(&mut self, reason: &str) {
        log::error!("{}", reason);
        self.conn = None;
        self.tracker.reset();
        if self.state != MonitorState::Idle {
            self.set_state(MonitorState::Idle);
        }
        self.presenter.on_connectivity_lost(reason);
    }

    fn set_state(&mut self, state: MonitorState) {
        self.state = state;
        self.presenter.on_state_change(state);
    }

    /// Flush every log sink
    pub fn close(&self) {
        self.registry.close();
        if let Err(e) = self.alert_sink.flush() {
            log::warn!("Failed to flush alert log: {}", e);
        }
    }
}

/// Sample ids are UTC RFC 3339 timestamps with millisecond precision
pub fn new_sample_id() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
