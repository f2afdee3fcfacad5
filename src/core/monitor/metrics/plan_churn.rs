use serde::{Deserialize, Serialize};

use super::{count_of, details_table, fixed, list_data, list_records};
use crate::core::monitor::connection::{Connection, QueryParams, SqlValue};
use crate::core::monitor::metric::{
    integer, real, text, Category, CollectOptions, Details, Metric, MetricData, MetricDescriptor,
    StorageSchema, StoredRow, Summary, DEFAULT_ROW_LIMIT,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "PlanChurn",
    display_name: "Plan Churn",
    description: "Most executed SQL cursors with their plan hash values",
    category: Category::Performance,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "plan_churn_history",
    columns: &[
        text("sql_id"),
        integer("plan_hash_value"),
        integer("executions"),
        real("elapsed_seconds"),
        integer("buffer_gets"),
        integer("disk_reads"),
        integer("rows_processed"),
        text("last_active_time"),
    ],
    indexes: &["sql_id"],
};

const PLAN_CHURN_SQL: &str = "
    SELECT sql_id, plan_hash_value, executions, elapsed_time / 1000000 AS elapsed_seconds,
           buffer_gets, disk_reads, rows_processed,
           TO_CHAR(last_active_time, 'YYYY-MM-DD\"T\"HH24:MI:SS') AS last_active_time
    FROM v$sql
    WHERE executions > 0
    ORDER BY executions DESC
    FETCH FIRST :limit ROWS ONLY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStat {
    pub sql_id: String,
    pub plan_hash_value: i64,
    pub executions: i64,
    pub elapsed_seconds: f64,
    pub buffer_gets: i64,
    pub disk_reads: i64,
    pub rows_processed: i64,
    pub last_active_time: String,
}

/// Hot cursors. A `sql_id` appearing with several plan hash values within a
/// sample, or changing its hash across samples, is plan churn.
pub struct PlanChurn;

impl PlanChurn {
    /// Number of distinct sql_ids that show more than one plan
    fn churning(plans: &[PlanStat]) -> usize {
        let mut seen: std::collections::HashMap<&str, std::collections::HashSet<i64>> =
            std::collections::HashMap::new();
        for plan in plans {
            seen.entry(plan.sql_id.as_str())
                .or_default()
                .insert(plan.plan_hash_value);
        }
        seen.values().filter(|hashes| hashes.len() > 1).count()
    }
}

impl Metric for PlanChurn {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, conn: &dyn Connection, options: &CollectOptions) -> Result<Option<MetricData>> {
        let params = QueryParams::new().with("limit", options.limit_or(DEFAULT_ROW_LIMIT));
        let mut plans = Vec::new();
        for row in conn.execute(PLAN_CHURN_SQL, &params)? {
            plans.push(PlanStat {
                sql_id: row.text(0)?,
                plan_hash_value: row.int(1)?,
                executions: row.int(2)?,
                elapsed_seconds: row.float(3)?,
                buffer_gets: row.int(4)?,
                disk_reads: row.int(5)?,
                rows_processed: row.int(6)?,
                last_active_time: row.text(7)?,
            });
        }
        list_data("plans", &plans).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let plans: Vec<PlanStat> = list_records(data, "plans")?;
        Ok(plans
            .into_iter()
            .map(|p| {
                vec![
                    SqlValue::from(p.sql_id),
                    SqlValue::from(p.plan_hash_value),
                    SqlValue::from(p.executions),
                    SqlValue::from(p.elapsed_seconds),
                    SqlValue::from(p.buffer_gets),
                    SqlValue::from(p.disk_reads),
                    SqlValue::from(p.rows_processed),
                    SqlValue::from(p.last_active_time),
                ]
            })
            .collect())
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let plans: Vec<PlanStat> = list_records(data, "plans").ok()?;
        Some(
            Summary::new()
                .with("Statements", count_of(data))
                .with("Multi-plan SQL", Self::churning(&plans)),
        )
    }

    fn render_details(&self, data: &MetricData) -> Option<Details> {
        let plans: Vec<PlanStat> = list_records(data, "plans").ok()?;
        Some(details_table(
            &["SQL ID", "Plan Hash", "Execs", "Elapsed (s)", "Buffer Gets", "Disk Reads", "Last Active"],
            &plans,
            |p| {
                vec![
                    p.sql_id.clone(),
                    p.plan_hash_value.to_string(),
                    p.executions.to_string(),
                    fixed(p.elapsed_seconds),
                    p.buffer_gets.to_string(),
                    p.disk_reads.to_string(),
                    p.last_active_time.clone(),
                ]
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(sql_id: &str, hash: i64) -> PlanStat {
        PlanStat {
            sql_id: sql_id.into(),
            plan_hash_value: hash,
            executions: 1,
            elapsed_seconds: 0.1,
            buffer_gets: 10,
            disk_reads: 0,
            rows_processed: 1,
            last_active_time: "2024-01-15T10:30:00".into(),
        }
    }

    #[test]
    fn test_churning_counts_multi_plan_sql() {
        let plans = vec![plan("a", 1), plan("a", 2), plan("b", 3), plan("b", 3)];
        assert_eq!(PlanChurn::churning(&plans), 1);
    }
}
