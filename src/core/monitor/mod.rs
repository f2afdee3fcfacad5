//! Database metric collection framework.
//!
//! Metric units wrap one read-only query each. The registry runs them as a
//! batch, and the orchestrator drives ticks on an interval, evaluating alerts
//! and writing logs and history along the way.

pub mod alerts;
pub mod connection;
mod history;
pub mod metric;
pub mod metrics;
mod orchestrator;
mod registry;
mod runtime;
pub mod sink;
mod storage;
mod unit;

pub use alerts::{
    check_alerts, Alert, AlertKey, AlertPolicy, AlertSeverity, AlertThresholds, AlertTracker,
};
pub use connection::{Connection, QueryError, QueryParams, Row, SqlValue};
pub use history::{TickHistory, TickSummary};
pub use metric::{
    Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor, StorageSchema, Summary,
};
pub use orchestrator::{
    new_sample_id, validate_interval, Monitor, MonitorSettings, MonitorState, NullPresenter,
    Presenter, TickReport, DEFAULT_INTERVAL_SECS, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
};
pub use registry::{Bundle, MetricRegistry};
pub use runtime::{Connector, MonitorCommand, MonitorRuntime};
pub use sink::{JsonlSink, JsonlSinkFactory, LogRecord, LogSink, MemorySinkFactory, SinkFactory};
pub use storage::{HistoryRows, HistoryStore};
pub use unit::{Collection, MetricUnit};
