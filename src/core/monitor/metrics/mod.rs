//! Built-in metrics.
//!
//! Registration is a static list: adding a metric means adding one line to
//! [`builtin_metrics`].

mod blocking_sessions;
mod host_metrics;
mod io_sessions;
mod plan_churn;
mod redo_metrics;
mod resource_limits;
mod session_overview;
mod tablespace_usage;
mod temp_usage;
mod top_sessions;
mod undo_metrics;
mod wait_events;

pub use blocking_sessions::{BlockingPair, BlockingSessions};
pub use host_metrics::{HostMetrics, HostSnapshot};
pub use io_sessions::{IoSession, IoSessions};
pub use plan_churn::{PlanChurn, PlanStat};
pub use redo_metrics::{RedoMetrics, RedoStats};
pub use resource_limits::{ResourceLimit, ResourceLimits};
pub use session_overview::{SessionOverview, SessionTotals};
pub use tablespace_usage::{TablespaceStat, TablespaceUsage};
pub use temp_usage::{TempSegment, TempUsage};
pub use top_sessions::{TopSession, TopSessions};
pub use undo_metrics::{UndoMetrics, UndoStats};
pub use wait_events::{WaitEvent, WaitEvents};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::connection::{Connection, QueryParams};
use super::metric::{Details, Metric, MetricData};
use crate::error::{OramonError, Result};

/// One instance of every built-in metric, in registration order
pub fn builtin_metrics() -> Vec<Box<dyn Metric>> {
    vec![
        Box::new(SessionOverview),
        Box::new(TopSessions),
        Box::new(BlockingSessions),
        Box::new(TablespaceUsage),
        Box::new(WaitEvents),
        Box::new(TempUsage),
        Box::new(UndoMetrics),
        Box::new(RedoMetrics),
        Box::new(PlanChurn),
        Box::new(IoSessions),
        Box::new(HostMetrics::new()),
        Box::new(ResourceLimits),
    ]
}

/// Look up a statistic number in `v$statname`
pub(crate) fn statistic_id(conn: &dyn Connection, name: &str) -> Result<Option<i64>> {
    let row = conn.fetch_one(
        "SELECT statistic# FROM v$statname WHERE name = :name",
        &QueryParams::new().with("name", name),
    )?;
    match row {
        Some(row) => Ok(row.opt_int(0)?),
        None => Ok(None),
    }
}

/// `{ <key>: [records...], "count": n }`
pub(crate) fn list_data<T: Serialize>(key: &str, records: &[T]) -> Result<MetricData> {
    let mut fields = Map::new();
    fields.insert(key.to_string(), serde_json::to_value(records)?);
    fields.insert("count".to_string(), Value::from(records.len()));
    Ok(MetricData::new(fields))
}

/// Decode the list stored under `key`
pub(crate) fn list_records<T: DeserializeOwned>(data: &MetricData, key: &str) -> Result<Vec<T>> {
    let list = data
        .get(key)
        .ok_or_else(|| OramonError::other(format!("missing list field '{}'", key)))?;
    Ok(serde_json::from_value(list.clone())?)
}

pub(crate) fn count_of(data: &MetricData) -> usize {
    data.get_f64("count").unwrap_or(0.0) as usize
}

/// Build a details table from typed records
pub(crate) fn details_table<T>(
    columns: &[&str],
    records: &[T],
    row: impl Fn(&T) -> Vec<String>,
) -> Details {
    let mut details = Details::new(columns.iter().copied());
    for record in records {
        details.push_row(row(record));
    }
    details
}

pub(crate) fn fixed(value: f64) -> String {
    format!("{:.2}", value)
}
