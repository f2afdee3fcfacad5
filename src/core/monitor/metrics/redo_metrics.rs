use humansize::{format_size, BINARY};
use serde::{Deserialize, Serialize};

use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    real, Category, CollectOptions, Metric, MetricData, MetricDescriptor, StorageSchema, StoredRow,
    Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "RedoMetrics",
    display_name: "Redo Metrics",
    description: "Redo log generation and performance metrics",
    category: Category::Performance,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "redo_metrics_history",
    columns: &[real("redo_size"), real("redo_writes"), real("redo_write_time")],
    indexes: &[],
};

const REDO_SQL: &str = "
    SELECT name, value FROM v$sysstat
    WHERE name IN ('redo size', 'redo writes', 'redo write time')";

/// Cumulative redo statistics since instance startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedoStats {
    pub redo_size: f64,
    pub redo_writes: f64,
    pub redo_write_time: f64,
}

pub struct RedoMetrics;

impl Metric for RedoMetrics {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        let mut stats = RedoStats::default();
        for row in conn.execute(REDO_SQL, &QueryParams::new())? {
            let value = row.float(1)?;
            match row.text(0)?.as_str() {
                "redo size" => stats.redo_size = value,
                "redo writes" => stats.redo_writes = value,
                "redo write time" => stats.redo_write_time = value,
                _ => {}
            }
        }
        MetricData::from_record(&stats).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let s: RedoStats = data.decode()?;
        Ok(vec![vec![
            SqlValue::from(s.redo_size),
            SqlValue::from(s.redo_writes),
            SqlValue::from(s.redo_write_time),
        ]])
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let s: RedoStats = data.decode().ok()?;
        Some(
            Summary::new()
                .with("Redo Generated", format_size(s.redo_size.max(0.0) as u64, BINARY))
                .with("Redo Writes", s.redo_writes as u64)
                .with("Write Time (cs)", s.redo_write_time as u64),
        )
    }
}
