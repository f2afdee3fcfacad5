use serde::{Deserialize, Serialize};

use super::{count_of, details_table, fixed, list_data, list_records};
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary, DEFAULT_ROW_LIMIT,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "IoSessions",
    display_name: "I/O Sessions",
    description: "Session-level I/O statistics",
    category: Category::Performance,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "io_sessions_history",
    columns: &[
        integer("sid"),
        text("username"),
        text("program"),
        text("status"),
        text("sql_id"),
        real("read_mb"),
        real("write_mb"),
    ],
    indexes: &["sid"],
};

// Block counts are converted to MB assuming 8K blocks
const IO_SESSIONS_SQL: &str = "
    SELECT s.sid, s.username, s.program, s.status, s.sql_id,
           ROUND((i.block_gets + i.consistent_gets) / 128, 2) AS read_mb,
           ROUND(i.physical_writes / 128, 2) AS write_mb
    FROM v$session s
    JOIN v$sess_io i ON s.sid = i.sid
    WHERE s.username IS NOT NULL
    ORDER BY (i.block_gets + i.consistent_gets) DESC
    FETCH FIRST :limit ROWS ONLY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoSession {
    pub sid: i64,
    pub username: String,
    pub program: String,
    pub status: String,
    pub sql_id: String,
    pub read_mb: f64,
    pub write_mb: f64,
}

pub struct IoSessions;

impl Metric for IoSessions {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, options: &CollectOptions) -> Result<Option<MetricData>> {
        let params = QueryParams::new().with("limit", options.limit_or(DEFAULT_ROW_LIMIT));
        let mut sessions = Vec::new();
        for row in conn.execute(IO_SESSIONS_SQL, &params)? {
            sessions.push(IoSession {
                sid: row.int(0)?,
                username: row.text(1)?,
                program: row.text(2)?,
                status: row.text(3)?,
                sql_id: row.text(4)?,
                read_mb: row.float(5)?,
                write_mb: row.float(6)?,
            });
        }
        list_data("io_sessions", &sessions).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let sessions: Vec<IoSession> = list_records(data, "io_sessions")?;
        Ok(sessions
            .into_iter()
            .map(|s| {
                vec![
                    SqlValue::from(s.sid),
                    SqlValue::from(s.username),
                    SqlValue::from(s.program),
                    SqlValue::from(s.status),
                    SqlValue::from(s.sql_id),
                    SqlValue::from(s.read_mb),
                    SqlValue::from(s.write_mb),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let sessions: Vec<IoSession> = list_records(data, "io_sessions").ok()?;
        let read: f64 = sessions.iter().map(|s| s.read_mb).sum();
        let written: f64 = sessions.iter().map(|s| s.write_mb).sum();
        Some(
            Summary::new()
                .with("Sessions", count_of(data))
                .with("Read (MB)", format!("{:.1}", read))
                .with("Written (MB)", format!("{:.1}", written)),
        )
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let sessions: Vec<IoSession> = list_records(data, "io_sessions").ok()?;
        Some(details_table(
            &["SID", "User", "Status", "SQL ID", "Read (MB)", "Write (MB)"],
            &sessions,
            |s| {
                vec![
                    s.sid.to_string(),
                    s.username.clone(),
                    s.status.clone(),
                    s.sql_id.clone(),
                    fixed(s.read_mb),
                    fixed(s.write_mb),
                ]
            },
        ))
    }
}
