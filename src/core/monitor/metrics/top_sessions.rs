use serde::{Deserialize, Serialize};

use super::{count_of, details_table, fixed, list_data, list_records, statistic_id};
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary, DEFAULT_ROW_LIMIT,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "TopSessions",
    display_name: "Top Sessions",
    description: "Top resource-consuming sessions by logical reads and CPU",
    category: Category::Sessions,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "top_sessions_history",
    columns: &[
        integer("sid"),
        integer("serial"),
        text("username"),
        text("program"),
        text("status"),
        real("logical_reads_mb"),
        real("cpu_seconds"),
        text("event"),
        text("sql_id"),
        text("machine"),
        text("module"),
    ],
    indexes: &["sid"],
};

const TOP_SESSIONS_SQL: &str = "
    SELECT
        s.sid,
        s.serial#,
        s.username,
        s.program,
        s.status,
        ROUND(MAX(CASE WHEN stat.statistic# = :stat_logical THEN stat.value ELSE 0 END) / 1024 / 1024, 2) AS logical_reads_mb,
        ROUND(MAX(CASE WHEN stat.statistic# = :stat_cpu THEN stat.value ELSE 0 END) / 100, 2) AS cpu_seconds,
        s.event,
        s.sql_id,
        s.machine,
        s.module
    FROM v$session s
    LEFT JOIN v$sesstat stat ON s.sid = stat.sid
        AND stat.statistic# IN (:stat_logical, :stat_cpu)
    WHERE s.username IS NOT NULL
    GROUP BY s.sid, s.serial#, s.username, s.program, s.status, s.event, s.sql_id, s.machine, s.module
    ORDER BY MAX(CASE WHEN stat.statistic# = :stat_logical THEN stat.value ELSE 0 END) DESC
    FETCH FIRST :limit ROWS ONLY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSession {
    pub sid: i64,
    pub serial: i64,
    pub username: String,
    pub program: String,
    pub status: String,
    pub logical_reads_mb: f64,
    pub cpu_seconds: f64,
    pub event: String,
    pub sql_id: String,
    pub machine: String,
    pub module: String,
}

/// Sessions ordered by logical reads, limited by the row limit
pub struct TopSessions;

impl Metric for TopSessions {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, options: &CollectOptions) -> Result<Option<MetricData>> {
        let logical = statistic_id(conn, "session logical reads")?;
        let cpu = statistic_id(conn, "CPU used by this session")?;
        let (Some(logical), Some(cpu)) = (logical, cpu) else {
            return Ok(None);
        };

        let params = QueryParams::new()
            .with("stat_logical", logical)
            .with("stat_cpu", cpu)
            .with("limit", options.limit_or(DEFAULT_ROW_LIMIT));

        let mut sessions = Vec::new();
        for row in conn.execute(TOP_SESSIONS_SQL, &params)? {
            sessions.push(TopSession {
                sid: row.int(0)?,
                serial: row.int(1)?,
                username: row.text(2)?,
                program: row.text(3)?,
                status: row.text(4)?,
                logical_reads_mb: row.float(5)?,
                cpu_seconds: row.float(6)?,
                event: row.text(7)?,
                sql_id: row.text(8)?,
                machine: row.text(9)?,
                module: row.text(10)?,
            });
        }
        list_data("sessions", &sessions).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let sessions: Vec<TopSession> = list_records(data, "sessions")?;
        Ok(sessions
            .into_iter()
            .map(|s| {
                vec![
                    SqlValue::from(s.sid),
                    SqlValue::from(s.serial),
                    SqlValue::from(s.username),
                    SqlValue::from(s.program),
                    SqlValue::from(s.status),
                    SqlValue::from(s.logical_reads_mb),
                    SqlValue::from(s.cpu_seconds),
                    SqlValue::from(s.event),
                    SqlValue::from(s.sql_id),
                    SqlValue::from(s.machine),
                    SqlValue::from(s.module),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let sessions: Vec<TopSession> = list_records(data, "sessions").ok()?;
        let summary = Summary::new().with("Sessions", count_of(data));
        match sessions.first() {
            Some(top) => Some(
                summary
                    .with("Top SID", top.sid)
                    .with("Top Reads (MB)", format!("{:.1}", top.logical_reads_mb)),
            ),
            None => Some(summary),
        }
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let sessions: Vec<TopSession> = list_records(data, "sessions").ok()?;
        Some(details_table(
            &["SID", "Serial", "User", "Status", "Reads (MB)", "CPU (s)", "SQL ID", "Event"],
            &sessions,
            |s| {
                vec![
                    s.sid.to_string(),
                    s.serial.to_string(),
                    s.username.clone(),
                    s.status.clone(),
                    fixed(s.logical_reads_mb),
                    fixed(s.cpu_seconds),
                    s.sql_id.clone(),
                    s.event.clone(),
                ]
            },
        ))
    }
}
