// The bundled demo fixture answers every built-in metric

use oramon::core::monitor::metrics::{PlanChurn, TablespaceStat};
use oramon::core::monitor::{CollectOptions, Connection, MemorySinkFactory, Metric, MetricRegistry};
use oramon::platform::{open_connection, FixtureConnection};
use oramon::core::config::DatabaseConfig;

use super::support::{demo_connection, demo_fixture_path};

#[test]
fn test_demo_fixture_covers_every_metric() {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    let bundle = registry.collect_all(&demo_connection(), &CollectOptions::default());
    assert_eq!(bundle.len(), 12);
    assert_eq!(bundle.collected_count(), 12);
}

#[test]
fn test_every_metric_renders_summary() {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    let bundle = registry.collect_all(&demo_connection(), &CollectOptions::default());
    for unit in registry.get_all_metrics() {
        let data = bundle.get(unit.name()).unwrap();
        let summary = unit.render_summary(data);
        assert!(summary.map(|s| !s.is_empty()).unwrap_or(false), "{}", unit.name());
    }
}

#[test]
fn test_demo_tablespaces_decode() {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    let bundle = registry.collect_all(&demo_connection(), &CollectOptions::default());
    let data = bundle.get("TablespaceUsage").unwrap();
    let list: Vec<TablespaceStat> =
        serde_json::from_value(data.get("tablespaces").unwrap().clone()).unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0].tablespace, "USERS");
}

#[test]
fn test_plan_churn_counts_multi_plan_sql() {
    let data = PlanChurn
        .collect(&demo_connection(), &CollectOptions::default())
        .unwrap()
        .unwrap();
    let summary = PlanChurn.render_summary(&data).unwrap();
    assert_eq!(summary.get("Statements"), Some("3"));
    assert_eq!(summary.get("Multi-plan SQL"), Some("1"));
}

#[test]
fn test_open_connection_with_fixture() {
    let conn = open_connection(&DatabaseConfig::default(), Some(&demo_fixture_path())).unwrap();
    assert!(conn.is_alive());
    assert!(conn.describe().starts_with("fixture:demo"));
}

#[test]
fn test_missing_fixture_file() {
    let result = FixtureConnection::load(std::path::Path::new("/nonexistent/fixture.json"));
    assert!(result.is_err());
}
