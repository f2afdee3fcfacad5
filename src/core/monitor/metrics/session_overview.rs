//! Instance-wide session counts, reads and CPU.

use serde::{Deserialize, Serialize};

use super::statistic_id;
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, Category, CollectOptions, Metric, MetricData, MetricDescriptor, StorageSchema,
    StoredRow, Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "SessionOverview",
    display_name: "Session Overview",
    description: "Overall session statistics including counts, reads, and CPU usage",
    category: Category::Sessions,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "session_overview_history",
    columns: &[
        integer("total_sessions"),
        integer("active_sessions"),
        integer("inactive_sessions"),
        integer("blocked_sessions"),
        real("logical_reads_mb"),
        real("physical_reads_mb"),
        real("cpu_seconds"),
    ],
    indexes: &["sample_id"],
};

const OVERVIEW_SQL: &str = "
    SELECT
        COUNT(DISTINCT s.sid) AS total_sessions,
        COUNT(DISTINCT CASE WHEN s.status = 'ACTIVE' THEN s.sid END) AS active_sessions,
        COUNT(DISTINCT CASE WHEN s.status = 'INACTIVE' THEN s.sid END) AS inactive_sessions,
        COUNT(DISTINCT CASE WHEN s.blocking_session IS NOT NULL THEN s.sid END) AS blocked_sessions,
        ROUND(SUM(CASE WHEN stat.statistic# = :stat_logical THEN stat.value ELSE 0 END) / 1024 / 1024, 2) AS logical_reads_mb,
        ROUND(SUM(CASE WHEN stat.statistic# = :stat_physical THEN stat.value ELSE 0 END) / 1024 / 1024, 2) AS physical_reads_mb,
        ROUND(SUM(CASE WHEN stat.statistic# = :stat_cpu THEN stat.value ELSE 0 END) / 100, 2) AS cpu_seconds
    FROM v$session s
    LEFT JOIN v$sesstat stat ON s.sid = stat.sid
        AND stat.statistic# IN (:stat_logical, :stat_physical, :stat_cpu)
    WHERE s.username IS NOT NULL";

/// Aggregated session figures for user sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub inactive_sessions: i64,
    pub blocked_sessions: i64,
    pub logical_reads_mb: f64,
    pub physical_reads_mb: f64,
    pub cpu_seconds: f64,
}

/// Session counts plus summed logical reads, physical reads and CPU.
///
/// The statistic numbers differ between Oracle releases, so they are looked
/// up in `v$statname` on every collection. If any of them is unknown the
/// metric reports no data.
pub struct SessionOverview;

impl Metric for SessionOverview {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        let logical = statistic_id(conn, "session logical reads")?;
        let physical = statistic_id(conn, "physical reads")?;
        let cpu = statistic_id(conn, "CPU used by this session")?;
        let (Some(logical), Some(physical), Some(cpu)) = (logical, physical, cpu) else {
            return Ok(None);
        };

        let params = QueryParams::new()
            .with("stat_logical", logical)
            .with("stat_physical", physical)
            .with("stat_cpu", cpu);
        let Some(row) = conn.fetch_one(OVERVIEW_SQL, &params)? else {
            return Ok(None);
        };

        let totals = SessionTotals {
            total_sessions: row.int(0)?,
            active_sessions: row.int(1)?,
            inactive_sessions: row.int(2)?,
            blocked_sessions: row.int(3)?,
            logical_reads_mb: row.float(4)?,
            physical_reads_mb: row.float(5)?,
            cpu_seconds: row.float(6)?,
        };
        MetricData::from_record(&totals).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let t: SessionTotals = data.decode()?;
        Ok(vec![vec![
            SqlValue::from(t.total_sessions),
            SqlValue::from(t.active_sessions),
            SqlValue::from(t.inactive_sessions),
            SqlValue::from(t.blocked_sessions),
            SqlValue::from(t.logical_reads_mb),
            SqlValue::from(t.physical_reads_mb),
            SqlValue::from(t.cpu_seconds),
        ]])
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let count = |field: &str| data.get_f64(field).unwrap_or(0.0) as i64;
        Some(
            Summary::new()
                .with("Total Sessions", count("total_sessions"))
                .with("Active", count("active_sessions"))
                .with("Inactive", count("inactive_sessions"))
                .with("Blocked", count("blocked_sessions"))
                .with("CPU (sec)", format!("{:.1}", data.get_f64("cpu_seconds").unwrap_or(0.0)))
                .with(
                    "Logical Reads (MB)",
                    format!("{:.1}", data.get_f64("logical_reads_mb").unwrap_or(0.0)),
                ),
        )
    }
}
