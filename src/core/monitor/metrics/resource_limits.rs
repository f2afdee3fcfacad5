use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::details_table;
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "ResourceLimits",
    display_name: "Resource Limits",
    description: "Database resource usage vs limits",
    category: Category::System,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "resource_limits_history",
    columns: &[
        text("resource_name"),
        integer("current_utilization"),
        integer("max_utilization"),
        text("limit_value"),
    ],
    indexes: &["resource_name"],
};

const RESOURCE_LIMITS_SQL: &str = "
    SELECT resource_name, current_utilization, max_utilization, TRIM(limit_value)
    FROM v$resource_limit
    WHERE resource_name IN ('processes', 'sessions')";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimit {
    pub current: i64,
    pub max: i64,
    /// Kept as text: Oracle reports `UNLIMITED` for some resources
    pub limit: String,
}

impl ResourceLimit {
    fn usage(&self) -> String {
        format!("{} / {}", self.current, self.limit)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Limits {
    limits: BTreeMap<String, ResourceLimit>,
}

pub struct ResourceLimits;

impl Metric for ResourceLimits {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        let mut limits = Limits::default();
        for row in conn.execute(RESOURCE_LIMITS_SQL, &QueryParams::new())? {
            limits.limits.insert(
                row.text(0)?.to_lowercase(),
                ResourceLimit {
                    current: row.int(1)?,
                    max: row.int(2)?,
                    limit: row.text(3)?,
                },
            );
        }
        MetricData::from_record(&limits).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let limits: Limits = data.decode()?;
        Ok(limits
            .limits
            .into_iter()
            .map(|(name, l)| {
                vec![
                    SqlValue::from(name),
                    SqlValue::from(l.current),
                    SqlValue::from(l.max),
                    SqlValue::from(l.limit),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let limits: Limits = data.decode().ok()?;
        let mut summary = Summary::new();
        for (name, limit) in &limits.limits {
            let mut label = name.clone();
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            summary = summary.with(label, limit.usage());
        }
        Some(summary)
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let limits: Limits = data.decode().ok()?;
        let rows: Vec<_> = limits.limits.into_iter().collect();
        Some(details_table(
            &["Resource", "Current", "Max", "Limit"],
            &rows,
            |(name, l)| vec![name.clone(), l.current.to_string(), l.max.to_string(), l.limit.clone()],
        ))
    }
}
