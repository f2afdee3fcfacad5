use serde::{Deserialize, Serialize};

use super::{count_of, details_table, fixed, list_data, list_records};
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary, DEFAULT_ROW_LIMIT,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "WaitEvents",
    display_name: "Wait Events",
    description: "Top non-idle system wait events",
    category: Category::Performance,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "wait_events_history",
    columns: &[
        text("event"),
        integer("total_waits"),
        real("total_wait_seconds"),
        real("avg_wait_ms"),
    ],
    indexes: &["event"],
};

// time_waited is in centiseconds
const WAIT_EVENTS_SQL: &str = "
    SELECT event,
           total_waits,
           time_waited / 100 AS total_wait_seconds,
           CASE WHEN total_waits > 0 THEN time_waited * 10 / total_waits ELSE 0 END AS avg_wait_ms
    FROM v$system_event
    WHERE wait_class != 'Idle'
    ORDER BY time_waited DESC
    FETCH FIRST :limit ROWS ONLY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitEvent {
    pub event: String,
    pub total_waits: i64,
    pub total_wait_seconds: f64,
    pub avg_wait_ms: f64,
}

pub struct WaitEvents;

impl Metric for WaitEvents {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, options: &CollectOptions) -> Result<Option<MetricData>> {
        let params = QueryParams::new().with("limit", options.limit_or(DEFAULT_ROW_LIMIT));
        let mut events = Vec::new();
        for row in conn.execute(WAIT_EVENTS_SQL, &params)? {
            events.push(WaitEvent {
                event: row.text(0)?,
                total_waits: row.int(1)?,
                total_wait_seconds: row.float(2)?,
                avg_wait_ms: row.float(3)?,
            });
        }
        list_data("wait_events", &events).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let events: Vec<WaitEvent> = list_records(data, "wait_events")?;
        Ok(events
            .into_iter()
            .map(|e| {
                vec![
                    SqlValue::from(e.event),
                    SqlValue::from(e.total_waits),
                    SqlValue::from(e.total_wait_seconds),
                    SqlValue::from(e.avg_wait_ms),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let events: Vec<WaitEvent> = list_records(data, "wait_events").ok()?;
        let summary = Summary::new().with("Events", count_of(data));
        match events.first() {
            Some(top) => Some(summary.with("Top Event", &top.event)),
            None => Some(summary),
        }
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let events: Vec<WaitEvent> = list_records(data, "wait_events").ok()?;
        Some(details_table(
            &["Event", "Waits", "Total (s)", "Avg (ms)"],
            &events,
            |e| {
                vec![
                    e.event.clone(),
                    e.total_waits.to_string(),
                    fixed(e.total_wait_seconds),
                    fixed(e.avg_wait_ms),
                ]
            },
        ))
    }
}
