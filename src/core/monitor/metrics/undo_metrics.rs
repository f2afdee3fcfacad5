use serde::{Deserialize, Serialize};

use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, Category, CollectOptions, Metric, MetricData, MetricDescriptor, StorageSchema,
    StoredRow, Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "UndoMetrics",
    display_name: "Undo Metrics",
    description: "Undo tablespace and transaction metrics",
    category: Category::Storage,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "undo_metrics_history",
    columns: &[
        integer("undo_retention"),
        integer("active_transactions"),
        real("undo_mb_active"),
        real("undo_mb_total"),
    ],
    indexes: &[],
};

const UNDO_SQL: &str = "
    SELECT (SELECT value FROM v$parameter WHERE name = 'undo_retention') AS undo_retention,
           (SELECT COUNT(*) FROM v$transaction) AS active_transactions,
           (SELECT SUM(bytes) / 1024 / 1024 FROM dba_undo_extents WHERE status = 'ACTIVE') AS undo_mb_active,
           (SELECT SUM(bytes) / 1024 / 1024 FROM dba_undo_extents) AS undo_mb_total
    FROM dual";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UndoStats {
    pub undo_retention: i64,
    pub active_transactions: i64,
    pub undo_mb_active: f64,
    pub undo_mb_total: f64,
}

pub struct UndoMetrics;

impl Metric for UndoMetrics {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        let Some(row) = conn.fetch_one(UNDO_SQL, &QueryParams::new())? else {
            return Ok(None);
        };
        let stats = UndoStats {
            undo_retention: row.int(0)?,
            active_transactions: row.int(1)?,
            undo_mb_active: row.float(2)?,
            undo_mb_total: row.float(3)?,
        };
        MetricData::from_record(&stats).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let s: UndoStats = data.decode()?;
        Ok(vec![vec![
            SqlValue::from(s.undo_retention),
            SqlValue::from(s.active_transactions),
            SqlValue::from(s.undo_mb_active),
            SqlValue::from(s.undo_mb_total),
        ]])
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let s: UndoStats = data.decode().ok()?;
        Some(
            Summary::new()
                .with("Retention (sec)", s.undo_retention)
                .with("Active Txns", s.active_transactions)
                .with("Active Undo (MB)", format!("{:.1}", s.undo_mb_active))
                .with("Total Undo (MB)", format!("{:.1}", s.undo_mb_total)),
        )
    }
}
