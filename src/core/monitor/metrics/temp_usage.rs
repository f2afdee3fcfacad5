use serde::{Deserialize, Serialize};

use super::{count_of, details_table, fixed, list_data, list_records};
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "TempUsage",
    display_name: "Temp Usage",
    description: "Temporary segment usage per session",
    category: Category::Storage,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "temp_usage_history",
    columns: &[
        integer("sid"),
        text("username"),
        text("program"),
        text("tablespace"),
        text("segtype"),
        real("used_mb"),
    ],
    indexes: &["sid"],
};

const TEMP_USAGE_SQL: &str = "
    SELECT s.sid, s.username, s.program, t.tablespace, t.segtype,
           ROUND(SUM(t.blocks * p.value) / 1024 / 1024, 2) AS used_mb
    FROM v$tempseg_usage t
    JOIN v$session s ON t.session_addr = s.saddr
    CROSS JOIN (SELECT TO_NUMBER(value) AS value FROM v$parameter WHERE name = 'db_block_size') p
    GROUP BY s.sid, s.username, s.program, t.tablespace, t.segtype
    ORDER BY used_mb DESC";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempSegment {
    pub sid: i64,
    pub username: String,
    pub program: String,
    pub tablespace: String,
    pub segtype: String,
    pub used_mb: f64,
}

pub struct TempUsage;

impl Metric for TempUsage {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        let mut segments = Vec::new();
        for row in conn.execute(TEMP_USAGE_SQL, &QueryParams::new())? {
            segments.push(TempSegment {
                sid: row.int(0)?,
                username: row.text(1)?,
                program: row.text(2)?,
                tablespace: row.text(3)?,
                segtype: row.text(4)?,
                used_mb: row.float(5)?,
            });
        }
        list_data("temp_usage", &segments).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let segments: Vec<TempSegment> = list_records(data, "temp_usage")?;
        Ok(segments
            .into_iter()
            .map(|s| {
                vec![
                    SqlValue::from(s.sid),
                    SqlValue::from(s.username),
                    SqlValue::from(s.program),
                    SqlValue::from(s.tablespace),
                    SqlValue::from(s.segtype),
                    SqlValue::from(s.used_mb),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let segments: Vec<TempSegment> = list_records(data, "temp_usage").ok()?;
        let total: f64 = segments.iter().map(|s| s.used_mb).sum();
        Some(
            Summary::new()
                .with("Segments", count_of(data))
                .with("Temp Used (MB)", format!("{:.1}", total)),
        )
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let segments: Vec<TempSegment> = list_records(data, "temp_usage").ok()?;
        Some(details_table(
            &["SID", "User", "Program", "Tablespace", "Segment", "Used (MB)"],
            &segments,
            |s| {
                vec![
                    s.sid.to_string(),
                    s.username.clone(),
                    s.program.clone(),
                    s.tablespace.clone(),
                    s.segtype.clone(),
                    fixed(s.used_mb),
                ]
            },
        ))
    }
}
