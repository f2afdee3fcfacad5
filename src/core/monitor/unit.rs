//! Metric unit: one metric plus its enabled flag and dedicated log sink.
//!
//! The unit is the failure boundary. Collection errors are logged through the
//! unit's own log target and turned into "no data"; nothing escapes into the
//! registry.

use chrono::Utc;

use super::connection::{Connection, QueryError};
use super::metric::{CollectOptions, Details, Metric, MetricData, MetricDescriptor, Summary};
use super::sink::{LogRecord, LogSink};
use super::storage::HistoryStore;
use crate::error::{OramonError, Result};

/// What happened during one absorbed collection
#[derive(Debug, Default)]
pub struct Collection {
    pub data: Option<MetricData>,
    pub failed: bool,
    /// The failure was reported by the connection as a lost session
    pub connection_lost: bool,
}

pub struct MetricUnit {
    metric: Box<dyn Metric>,
    sink: Box<dyn LogSink>,
    enabled: bool,
    log_target: String,
}

impl MetricUnit {
    pub fn new(metric: Box<dyn Metric>, sink: Box<dyn LogSink>) -> Self {
        let log_target = format!("oramon::metric::{}", metric.descriptor().name);
        Self {
            metric,
            sink,
            enabled: true,
            log_target,
        }
    }

    pub fn name(&self) -> &'static str {
        self.metric.descriptor().name
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        self.metric.descriptor()
    }

    pub fn metric(&self) -> &dyn Metric {
        self.metric.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// `log` target used for this unit's diagnostics
    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    pub fn log_location(&self) -> String {
        self.sink.location()
    }

    pub fn has_storage(&self) -> bool {
        self.metric.storage_schema().is_some()
    }

    /// Name of the history table, if the metric is persisted
    pub fn storage_table(&self) -> Option<&'static str> {
        self.metric.storage_schema().map(|schema| schema.table)
    }

    /// Run the metric's query and absorb any failure into `None`
    pub fn collect(&self, conn: &dyn Connection, options: &CollectOptions) -> Option<MetricData> {
        self.collect_with_status(conn, options).data
    }

    /// Like [`collect`](Self::collect), but reports whether it failed and why
    pub fn collect_with_status(
        &self,
        conn: &dyn Connection,
        options: &CollectOptions,
    ) -> Collection {
        match self.metric.collect(conn, options) {
            Ok(data) => {
                if data.is_none() {
                    log::debug!(target: self.log_target.as_str(), "No data returned");
                }
                Collection {
                    data,
                    failed: false,
                    connection_lost: false,
                }
            }
            Err(e) => {
                log::warn!(target: self.log_target.as_str(), "Error collecting {}: {}", self.name(), e);
                let connection_lost = matches!(
                    e,
                    OramonError::ConnectionLost(_)
                        | OramonError::Query(QueryError::ConnectionLost(_))
                );
                Collection {
                    data: None,
                    failed: true,
                    connection_lost,
                }
            }
        }
    }

    /// Append one `{timestamp, metric, sample_id, data}` line. `None` is a no-op.
    pub fn log_data(&self, data: Option<&MetricData>, sample_id: &str) -> Result<()> {
        let Some(data) = data else {
            return Ok(());
        };
        let record = LogRecord {
            timestamp: Utc::now().to_rfc3339(),
            metric: self.name().to_string(),
            sample_id: sample_id.to_string(),
            data: data.clone(),
        };
        self.sink.append(&serde_json::to_string(&record)?)
    }

    /// Create the unit's history table if it has one. Safe to repeat.
    pub fn init_storage(&self, store: &HistoryStore) -> Result<()> {
        let Some(schema) = self.metric.storage_schema() else {
            return Ok(());
        };
        let added = store.apply_schema(schema)?;
        if added > 0 {
            log::info!(target: self.log_target.as_str(), "Upgraded {} with {} new column(s)", schema.table, added);
        }
        log::debug!(target: self.log_target.as_str(), "Storage ready: {}", schema.table);
        Ok(())
    }

    /// Insert one row per logical record. Returns the number of rows written;
    /// 0 for `None` or when the metric is not persisted.
    pub fn store_data(
        &self,
        store: &mut HistoryStore,
        data: Option<&MetricData>,
        sample_id: &str,
    ) -> Result<usize> {
        let (Some(data), Some(schema)) = (data, self.metric.storage_schema()) else {
            return Ok(0);
        };
        let rows = self.metric.storage_rows(data)?;
        let timestamp = Utc::now().to_rfc3339();
        let inserted = store.insert(schema, sample_id, &timestamp, &rows)?;
        log::debug!(target: self.log_target.as_str(), "Stored {} row(s) in {}", inserted, schema.table);
        Ok(inserted)
    }

    pub fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        self.metric.render_summary(data)
    }

    pub fn render_details(&self, data: &MetricData) -> Option<Details> {
        self.metric.render_details(data)
    }

    pub fn flush(&self) -> Result<()> {
        self.sink.flush()
    }
}

impl std::fmt::Debug for MetricUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricUnit")
            .field("name", &self.name())
            .field("enabled", &self.enabled)
            .field("log", &self.sink.location())
            .finish()
    }
}
