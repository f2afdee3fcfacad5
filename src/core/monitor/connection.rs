//! Connection capability consumed by metric units.
//!
//! The monitored database is reached only through [`Connection`]. Metric units
//! issue read-only queries and get back positional [`Row`]s of [`SqlValue`]s.
//! Concrete connections live in the platform layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single column value returned by the monitored database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(v) => Some(*v),
            SqlValue::Float(v) => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::Float(v) => Some(*v),
            SqlValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Float(v) => Some(v.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<usize> for SqlValue {
    fn from(v: usize) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Errors raised while executing a query or reading its rows
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("{0}")]
    Database(String),

    #[error("column {index} missing from row with {width} columns")]
    MissingColumn { index: usize, width: usize },

    #[error("column {index}: cannot read '{value}' as {expected}")]
    Conversion {
        index: usize,
        expected: &'static str,
        value: String,
    },
}

impl QueryError {
    pub fn database<S: Into<String>>(msg: S) -> Self {
        QueryError::Database(msg.into())
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, QueryError::ConnectionLost(_))
    }
}

/// One positional result row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<SqlValue>);

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.0
    }

    /// Raw value at `index`; a short row is an error, never a silent default.
    pub fn value(&self, index: usize) -> Result<&SqlValue, QueryError> {
        self.0.get(index).ok_or(QueryError::MissingColumn {
            index,
            width: self.0.len(),
        })
    }

    pub fn opt_int(&self, index: usize) -> Result<Option<i64>, QueryError> {
        let value = self.value(index)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_i64()
            .map(Some)
            .ok_or_else(|| conversion(index, "integer", value))
    }

    pub fn opt_float(&self, index: usize) -> Result<Option<f64>, QueryError> {
        let value = self.value(index)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_f64()
            .map(Some)
            .ok_or_else(|| conversion(index, "number", value))
    }

    pub fn opt_text(&self, index: usize) -> Result<Option<String>, QueryError> {
        Ok(self.value(index)?.as_text())
    }

    /// Integer column, NULL read as 0
    pub fn int(&self, index: usize) -> Result<i64, QueryError> {
        Ok(self.opt_int(index)?.unwrap_or(0))
    }

    /// Numeric column, NULL read as 0.0
    pub fn float(&self, index: usize) -> Result<f64, QueryError> {
        Ok(self.opt_float(index)?.unwrap_or(0.0))
    }

    /// Text column, NULL read as "N/A"
    pub fn text(&self, index: usize) -> Result<String, QueryError> {
        Ok(self.opt_text(index)?.unwrap_or_else(|| "N/A".to_string()))
    }
}

impl From<Vec<SqlValue>> for Row {
    fn from(values: Vec<SqlValue>) -> Self {
        Self(values)
    }
}

fn conversion(index: usize, expected: &'static str, value: &SqlValue) -> QueryError {
    QueryError::Conversion {
        index,
        expected,
        value: value.to_string(),
    }
}

/// Named bind parameters for a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(BTreeMap<String, SqlValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<SqlValue>>(mut self, name: K, value: V) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Live, read-only connection to the monitored database.
///
/// Implementations must only ever be handed SELECT statements; write
/// protection is expected to be enforced by the database account itself.
pub trait Connection: Send {
    /// Execute a query and return every row.
    fn execute(&self, sql: &str, params: &QueryParams) -> Result<Vec<Row>, QueryError>;

    /// Whether the connection is still usable
    fn is_alive(&self) -> bool {
        true
    }

    /// Human-readable target description (for status output)
    fn describe(&self) -> String {
        "database".to_string()
    }

    /// Execute a query and return its first row, if any
    fn fetch_one(&self, sql: &str, params: &QueryParams) -> Result<Option<Row>, QueryError> {
        Ok(self.execute(sql, params)?.into_iter().next())
    }
}
