//! The metric contract.
//!
//! A metric wraps one observable of the monitored database: how to query it,
//! what shape the result has, how it is persisted and how it is summarized.
//! Persistence and rendering are optional capabilities with "not applicable"
//! defaults, so a display-only metric only implements `descriptor` and
//! `collect`.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::connection::{Connection, SqlValue};
use crate::error::{OramonError, Result};

/// Default row limit for list-shaped metrics
pub const DEFAULT_ROW_LIMIT: usize = 20;

/// Fixed set of metric categories, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sessions,
    Storage,
    Performance,
    System,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Sessions,
        Category::Storage,
        Category::Performance,
        Category::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sessions => "sessions",
            Category::Storage => "storage",
            Category::Performance => "performance",
            Category::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = OramonError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OramonError::config(format!("Unknown metric category: {}", s)))
    }
}

/// Identity and metadata of a metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Stable name; used for log file naming and enable/disable lookup
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub category: Category,
}

/// Per-call collection options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOptions {
    pub row_limit: Option<usize>,
}

impl CollectOptions {
    pub fn with_row_limit(limit: usize) -> Self {
        Self {
            row_limit: Some(limit),
        }
    }

    /// Row limit, falling back to `default` and never below 1
    pub fn limit_or(&self, default: usize) -> usize {
        self.row_limit.unwrap_or(default).max(1)
    }
}

/// Structured result of one collection: named scalars and/or named lists of
/// per-row records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricData(Map<String, Value>);

impl MetricData {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build from a typed record. The record must serialize to an object.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self> {
        match serde_json::to_value(record)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(OramonError::other(format!(
                "metric record must serialize to an object, got {}",
                other
            ))),
        }
    }

    /// Decode back into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(Value::as_f64)
    }

    /// Named list of per-row records
    pub fn list(&self, field: &str) -> Option<&Vec<Value>> {
        self.0.get(field).and_then(Value::as_array)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Small, ordered label -> value projection for compact display
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary(Vec<(String, String)>);

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<L: Into<String>, V: fmt::Display>(mut self, label: L, value: V) -> Self {
        self.0.push((label.into(), value.to_string()));
        self
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Tabular projection for full rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Details {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Details {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// SQLite column affinity for stored metric columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnType,
}

pub const fn integer(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnType::Integer,
    }
}

pub const fn real(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnType::Real,
    }
}

pub const fn text(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnType::Text,
    }
}

/// Table declaration for a metric's history.
///
/// Every table also gets `id`, `sample_id` and `timestamp`; `columns` lists
/// only the metric-specific ones, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSchema {
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
    /// Columns to index, besides `timestamp` which is always indexed
    pub indexes: &'static [&'static str],
}

/// One persisted row: values for `StorageSchema::columns`, in order
pub type StoredRow = Vec<SqlValue>;

/// One observable of the monitored database.
///
/// `collect` must stay read-only and may return `Ok(None)` when the database
/// has nothing to report. Errors are absorbed by the owning
/// [`MetricUnit`](super::MetricUnit), never by the registry.
pub trait Metric: Send {
    fn descriptor(&self) -> &MetricDescriptor;

    fn collect(
        &self,
        conn: &dyn Connection,
        options: &CollectOptions,
    ) -> Result<Option<MetricData>>;

    /// History table, if the metric is persisted
    fn storage_schema(&self) -> Option<&StorageSchema> {
        None
    }

    /// Map one result to zero or more rows matching `storage_schema`
    fn storage_rows(&self, _data: &MetricData) -> Result<Vec<StoredRow>> {
        Ok(Vec::new())
    }

    fn render_summary(&self, _data: &MetricData) -> Option<Summary> {
        None
    }

    /// Custom tabular rendering; `None` lets the caller fall back to a generic dump
    fn render_details(&self, _data: &MetricData) -> Option<Details> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        total: i64,
        names: Vec<String>,
    }

    #[test]
    fn test_metric_data_record_roundtrip() {
        let sample = Sample {
            total: 3,
            names: vec!["a".into()],
        };
        let data = MetricData::from_record(&sample).unwrap();
        assert_eq!(data.get_f64("total"), Some(3.0));
        assert_eq!(data.list("names").map(Vec::len), Some(1));
        assert_eq!(data.decode::<Sample>().unwrap(), sample);
    }

    #[test]
    fn test_metric_data_rejects_scalars() {
        assert!(MetricData::from_record(&5).is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Storage".parse::<Category>().unwrap(), Category::Storage);
        assert!("network".parse::<Category>().is_err());
    }

    #[test]
    fn test_summary_keeps_order() {
        let summary = Summary::new().with("b", 1).with("a", "x");
        let labels: Vec<_> = summary.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(
            serde_json::to_string(&summary).unwrap(),
            r#"{"b":"1","a":"x"}"#
        );
    }

    #[test]
    fn test_limit_never_zero() {
        assert_eq!(CollectOptions::with_row_limit(0).limit_or(20), 1);
        assert_eq!(CollectOptions::default().limit_or(20), 20);
    }
}
