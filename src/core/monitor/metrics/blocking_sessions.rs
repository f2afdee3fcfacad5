use serde::{Deserialize, Serialize};

use super::{count_of, details_table, list_data, list_records};
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "BlockingSessions",
    display_name: "Blocking Sessions",
    description: "Sessions blocking other sessions, with the waits they cause",
    category: Category::Sessions,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "blocking_sessions_history",
    columns: &[
        integer("blocking_sid"),
        integer("blocking_serial"),
        text("blocking_user"),
        text("blocking_program"),
        integer("blocked_sid"),
        integer("blocked_serial"),
        text("blocked_user"),
        text("blocked_program"),
        text("wait_event"),
        real("wait_seconds"),
    ],
    indexes: &["blocking_sid"],
};

const BLOCKING_SQL: &str = "
    SELECT
        blocking.sid AS blocking_sid,
        blocking.serial# AS blocking_serial,
        blocking.username AS blocking_user,
        blocking.program AS blocking_program,
        blocked.sid AS blocked_sid,
        blocked.serial# AS blocked_serial,
        blocked.username AS blocked_user,
        blocked.program AS blocked_program,
        blocked.event AS wait_event,
        blocked.seconds_in_wait AS wait_seconds
    FROM v$session blocking
    JOIN v$session blocked ON blocking.sid = blocked.blocking_session
    WHERE blocking.username IS NOT NULL
    ORDER BY blocked.seconds_in_wait DESC";

/// One blocker/blocked session pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingPair {
    pub blocking_sid: i64,
    pub blocking_serial: i64,
    pub blocking_user: String,
    pub blocking_program: String,
    pub blocked_sid: i64,
    pub blocked_serial: i64,
    pub blocked_user: String,
    pub blocked_program: String,
    pub wait_event: String,
    pub wait_seconds: f64,
}

pub struct BlockingSessions;

impl Metric for BlockingSessions {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        let mut pairs = Vec::new();
        for row in conn.execute(BLOCKING_SQL, &QueryParams::new())? {
            pairs.push(BlockingPair {
                blocking_sid: row.int(0)?,
                blocking_serial: row.int(1)?,
                blocking_user: row.text(2)?,
                blocking_program: row.text(3)?,
                blocked_sid: row.int(4)?,
                blocked_serial: row.int(5)?,
                blocked_user: row.text(6)?,
                blocked_program: row.text(7)?,
                wait_event: row.text(8)?,
                wait_seconds: row.float(9)?,
            });
        }
        list_data("blocking_sessions", &pairs).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let pairs: Vec<BlockingPair> = list_records(data, "blocking_sessions")?;
        Ok(pairs
            .into_iter()
            .map(|p| {
                vec![
                    SqlValue::from(p.blocking_sid),
                    SqlValue::from(p.blocking_serial),
                    SqlValue::from(p.blocking_user),
                    SqlValue::from(p.blocking_program),
                    SqlValue::from(p.blocked_sid),
                    SqlValue::from(p.blocked_serial),
                    SqlValue::from(p.blocked_user),
                    SqlValue::from(p.blocked_program),
                    SqlValue::from(p.wait_event),
                    SqlValue::from(p.wait_seconds),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let pairs: Vec<BlockingPair> = list_records(data, "blocking_sessions").ok()?;
        let longest = pairs.iter().map(|p| p.wait_seconds).fold(0.0, f64::max);
        Some(
            Summary::new()
                .with("Blocking Pairs", count_of(data))
                .with("Longest Wait (sec)", format!("{:.0}", longest)),
        )
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let pairs: Vec<BlockingPair> = list_records(data, "blocking_sessions").ok()?;
        Some(details_table(
            &["Blocker", "Blocker User", "Blocked", "Blocked User", "Event", "Wait (s)"],
            &pairs,
            |p| {
                vec![
                    format!("{},{}", p.blocking_sid, p.blocking_serial),
                    p.blocking_user.clone(),
                    format!("{},{}", p.blocked_sid, p.blocked_serial),
                    p.blocked_user.clone(),
                    p.wait_event.clone(),
                    format!("{:.0}", p.wait_seconds),
                ]
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fixture::FixtureConnection;

    #[test]
    fn test_no_blockers_is_empty_list() {
        let conn = FixtureConnection::default().with_rows("blocked.blocking_session", vec![]);
        let data = BlockingSessions
            .collect(&conn, &CollectOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(count_of(&data), 0);
        assert!(BlockingSessions.storage_rows(&data).unwrap().is_empty());
        assert_eq!(
            BlockingSessions.render_summary(&data).unwrap().get("Blocking Pairs"),
            Some("0")
        );
    }

    #[test]
    fn test_short_row_is_an_error() {
        let conn = FixtureConnection::default()
            .with_rows("blocked.blocking_session", vec![vec![SqlValue::Int(1)]]);
        assert!(BlockingSessions.collect(&conn, &CollectOptions::default()).is_err());
    }
}
