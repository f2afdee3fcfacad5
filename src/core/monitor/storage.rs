//! Embedded SQLite history store.
//!
//! One table per metric inside a shared database file. Tables are created
//! idempotently, existing tables missing newer columns are extended in place,
//! and rows are only ever inserted.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Number, Value as JsonValue};

use super::connection::SqlValue;
use super::metric::{StorageSchema, StoredRow};
use crate::error::{OramonError, Result};

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Float(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Rows read back from a history table, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl HistoryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every value of one column, in row order
    pub fn column(&self, name: &str) -> Vec<&JsonValue> {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => self.rows.iter().filter_map(|row| row.get(i)).collect(),
            None => Vec::new(),
        }
    }

    /// Rows as `column -> value` objects
    pub fn to_records(&self) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

fn json_value(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        ValueRef::Text(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => JsonValue::String(format!("<{} bytes>", b.len())),
    }
}

/// Local history database shared by all metric units
pub struct HistoryStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl HistoryStore {
    /// Open (or create) the database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Ensure the table and its indexes exist.
    ///
    /// Safe to call on every start. Returns how many columns had to be added
    /// to an existing table created by an older schema.
    pub fn apply_schema(&self, schema: &StorageSchema) -> Result<usize> {
        check_identifier(schema.table)?;
        for column in schema.columns {
            check_identifier(column.name)?;
        }

        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    sample_id TEXT,\n    timestamp TEXT NOT NULL",
            schema.table
        );
        for column in schema.columns {
            ddl.push_str(&format!(",\n    {} {}", column.name, column.kind.as_sql()));
        }
        ddl.push_str("\n)");
        self.conn.execute_batch(&ddl)?;

        let existing = self.table_columns(schema.table)?;
        let mut added = 0;
        for column in schema.columns {
            if !existing.iter().any(|c| c.eq_ignore_ascii_case(column.name)) {
                self.conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    schema.table,
                    column.name,
                    column.kind.as_sql()
                ))?;
                log::info!("Added column {}.{}", schema.table, column.name);
                added += 1;
            }
        }

        self.conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table}(timestamp)",
            table = schema.table
        ))?;
        for index in schema.indexes {
            check_identifier(index)?;
            self.conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table}({col})",
                table = schema.table,
                col = index
            ))?;
        }

        Ok(added)
    }

    /// Insert rows stamped with `sample_id` and `timestamp` in one transaction
    pub fn insert(
        &mut self,
        schema: &StorageSchema,
        sample_id: &str,
        timestamp: &str,
        rows: &[StoredRow],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            if row.len() != schema.columns.len() {
                return Err(OramonError::storage(format!(
                    "{}: row has {} values, schema has {} columns",
                    schema.table,
                    row.len(),
                    schema.columns.len()
                )));
            }
        }

        let names: Vec<&str> = schema.columns.iter().map(|c| c.name).collect();
        let placeholders = vec!["?"; names.len() + 2].join(", ");
        let sql = format!(
            "INSERT INTO {} (sample_id, timestamp, {}) VALUES ({})",
            schema.table,
            names.join(", "),
            placeholders
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let mut params: Vec<&dyn ToSql> = Vec::with_capacity(row.len() + 2);
                params.push(&sample_id);
                params.push(&timestamp);
                params.extend(row.iter().map(|v| v as &dyn ToSql));
                stmt.execute(params.as_slice())?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        check_identifier(table)?;
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(count)
    }

    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        check_identifier(table)?;
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |r| r.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// User tables, sorted by name
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    /// Distinct sample ids in `table`, oldest first
    pub fn sample_ids(&self, table: &str) -> Result<Vec<String>> {
        check_identifier(table)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT sample_id FROM {} GROUP BY sample_id ORDER BY MIN(id)",
            table
        ))?;
        let ids = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// The latest `limit` rows of `table`, newest first
    pub fn recent(&self, table: &str, limit: usize) -> Result<HistoryRows> {
        self.query_recent(table, None, limit)
    }

    /// The latest `limit` rows of `table` where `column` equals `value`
    pub fn recent_where(
        &self,
        table: &str,
        column: &str,
        value: &str,
        limit: usize,
    ) -> Result<HistoryRows> {
        self.query_recent(table, Some((column, value)), limit)
    }

    fn query_recent(
        &self,
        table: &str,
        filter: Option<(&str, &str)>,
        limit: usize,
    ) -> Result<HistoryRows> {
        check_identifier(table)?;
        let mut sql = format!("SELECT * FROM {}", table);
        let mut params = Vec::new();
        if let Some((column, value)) = filter {
            check_identifier(column)?;
            sql.push_str(&format!(" WHERE {} = ?", column));
            params.push(Value::Text(value.to_string()));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ?");
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(json_value))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(HistoryRows { columns, rows })
    }

    /// Distinct non-null values of a text column, sorted
    pub fn distinct_values(&self, table: &str, column: &str) -> Result<Vec<String>> {
        check_identifier(table)?;
        check_identifier(column)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL ORDER BY {col}",
            col = column,
            table = table
        ))?;
        let values = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(values)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Table and column names are formatted into SQL, so keep them plain
fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(OramonError::storage(format!("invalid identifier: {:?}", name)))
    }
}
