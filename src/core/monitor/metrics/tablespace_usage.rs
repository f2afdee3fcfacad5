use serde::{Deserialize, Serialize};

use super::{count_of, details_table, fixed, list_data, list_records};
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "TablespaceUsage",
    display_name: "Tablespace Usage",
    description: "Tablespace space usage including autoextend headroom",
    category: Category::Storage,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "tablespace_usage_history",
    columns: &[
        text("tablespace"),
        text("type"),
        text("status"),
        real("used_mb"),
        real("allocated_mb"),
        real("max_mb"),
        real("free_mb"),
        real("pct_used"),
        real("autoextend_headroom_mb"),
        integer("files"),
        integer("autoextend_files"),
        integer("autoextend_capable"),
    ],
    indexes: &["tablespace"],
};

const TABLESPACE_SQL: &str = "
    SELECT
        ts.tablespace_name,
        ts.contents AS type,
        ts.status,
        NVL(df.used_mb, 0) AS used_mb,
        NVL(df.allocated_mb, 0) AS allocated_mb,
        NVL(df.max_mb, 0) AS max_mb,
        NVL(df.allocated_mb - df.used_mb, 0) AS free_mb,
        CASE
            WHEN NVL(df.allocated_mb, 0) > 0 THEN ROUND((NVL(df.used_mb, 0) / df.allocated_mb) * 100, 2)
            ELSE 0
        END AS pct_used,
        NVL(df.max_mb - df.allocated_mb, 0) AS autoextend_headroom_mb,
        NVL(df.file_count, 0) AS files,
        NVL(df.autoextend_count, 0) AS autoextend_files,
        CASE WHEN NVL(df.autoextend_count, 0) > 0 THEN 1 ELSE 0 END AS autoextend_capable
    FROM dba_tablespaces ts
    LEFT JOIN (
        SELECT
            d.tablespace_name,
            ROUND(SUM(d.bytes) / 1024 / 1024, 2) AS allocated_mb,
            ROUND(SUM(CASE WHEN d.maxbytes = 0 THEN d.bytes ELSE d.maxbytes END) / 1024 / 1024, 2) AS max_mb,
            COUNT(*) AS file_count,
            SUM(CASE WHEN d.maxbytes > d.bytes THEN 1 ELSE 0 END) AS autoextend_count,
            ROUND((SUM(d.bytes) - NVL(MAX(f.free_bytes), 0)) / 1024 / 1024, 2) AS used_mb
        FROM dba_data_files d
        LEFT JOIN (
            SELECT tablespace_name, SUM(bytes) AS free_bytes
            FROM dba_free_space
            GROUP BY tablespace_name
        ) f ON f.tablespace_name = d.tablespace_name
        GROUP BY d.tablespace_name
    ) df ON ts.tablespace_name = df.tablespace_name
    WHERE ts.contents != 'UNDO'
    ORDER BY pct_used DESC";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablespaceStat {
    pub tablespace: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub used_mb: f64,
    pub allocated_mb: f64,
    pub max_mb: f64,
    pub free_mb: f64,
    pub pct_used: f64,
    pub autoextend_headroom_mb: f64,
    pub files: i64,
    pub autoextend_files: i64,
    pub autoextend_capable: i64,
}

/// Non-UNDO tablespaces, fullest first. `pct_used` is relative to allocated
/// space; `autoextend_headroom_mb` tells how far the files can still grow.
pub struct TablespaceUsage;

impl Metric for TablespaceUsage {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        let mut tablespaces = Vec::new();
        for row in conn.execute(TABLESPACE_SQL, &QueryParams::new())? {
            tablespaces.push(TablespaceStat {
                tablespace: row.text(0)?,
                kind: row.text(1)?,
                status: row.text(2)?,
                used_mb: row.float(3)?,
                allocated_mb: row.float(4)?,
                max_mb: row.float(5)?,
                free_mb: row.float(6)?,
                pct_used: row.float(7)?,
                autoextend_headroom_mb: row.float(8)?,
                files: row.int(9)?,
                autoextend_files: row.int(10)?,
                autoextend_capable: row.int(11)?,
            });
        }
        list_data("tablespaces", &tablespaces).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let tablespaces: Vec<TablespaceStat> = list_records(data, "tablespaces")?;
        Ok(tablespaces
            .into_iter()
            .map(|t| {
                vec![
                    SqlValue::from(t.tablespace),
                    SqlValue::from(t.kind),
                    SqlValue::from(t.status),
                    SqlValue::from(t.used_mb),
                    SqlValue::from(t.allocated_mb),
                    SqlValue::from(t.max_mb),
                    SqlValue::from(t.free_mb),
                    SqlValue::from(t.pct_used),
                    SqlValue::from(t.autoextend_headroom_mb),
                    SqlValue::from(t.files),
                    SqlValue::from(t.autoextend_files),
                    SqlValue::from(t.autoextend_capable),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let tablespaces: Vec<TablespaceStat> = list_records(data, "tablespaces").ok()?;
        let summary = Summary::new().with("Tablespaces", count_of(data));
        let fullest = tablespaces
            .iter()
            .max_by(|a, b| a.pct_used.total_cmp(&b.pct_used));
        match fullest {
            Some(t) => Some(summary.with("Fullest", format!("{} ({:.1}%)", t.tablespace, t.pct_used))),
            None => Some(summary),
        }
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let tablespaces: Vec<TablespaceStat> = list_records(data, "tablespaces").ok()?;
        Some(details_table(
            &["Tablespace", "Type", "Used (MB)", "Alloc (MB)", "Max (MB)", "Used %", "Headroom (MB)", "Files"],
            &tablespaces,
            |t| {
                vec![
                    t.tablespace.clone(),
                    t.kind.clone(),
                    fixed(t.used_mb),
                    fixed(t.allocated_mb),
                    fixed(t.max_mb),
                    format!("{:.1}", t.pct_used),
                    fixed(t.autoextend_headroom_mb),
                    format!("{} ({} auto)", t.files, t.autoextend_files),
                ]
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fixture::FixtureConnection;

    fn ts_row(name: &str, pct: f64) -> Vec<SqlValue> {
        vec![
            SqlValue::from(name),
            SqlValue::from("PERMANENT"),
            SqlValue::from("ONLINE"),
            SqlValue::Float(900.0),
            SqlValue::Float(1000.0),
            SqlValue::Float(2000.0),
            SqlValue::Float(100.0),
            SqlValue::Float(pct),
            SqlValue::Float(1000.0),
            SqlValue::Int(2),
            SqlValue::Int(1),
            SqlValue::Int(1),
        ]
    }

    #[test]
    fn test_type_field_keeps_its_name() {
        let conn = FixtureConnection::default()
            .with_rows("dba_tablespaces", vec![ts_row("USERS", 90.0), ts_row("SYSTEM", 50.0)]);
        let data = TablespaceUsage
            .collect(&conn, &CollectOptions::default())
            .unwrap()
            .unwrap();
        let first = &data.list("tablespaces").unwrap()[0];
        assert_eq!(first["type"], "PERMANENT");
        assert_eq!(first["pct_used"], 90.0);

        let summary = TablespaceUsage.render_summary(&data).unwrap();
        assert_eq!(summary.get("Fullest"), Some("USERS (90.0%)"));
        assert_eq!(TablespaceUsage.storage_rows(&data).unwrap().len(), 2);
    }
}
