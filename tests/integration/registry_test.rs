// Registry behavior: unique names, disabled metrics, failure isolation

use std::collections::HashSet;

use oramon::core::monitor::metrics::{SessionOverview, TablespaceUsage};
use oramon::core::monitor::{
    Category, CollectOptions, Connection, MemorySinkFactory, MetricRegistry, SqlValue,
};
use oramon::platform::FixtureConnection;
use oramon::OramonError;

use super::support::demo_connection;

#[test]
fn test_default_registry_names_are_unique() {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    let names: Vec<&str> = registry.get_all_metrics().iter().map(|u| u.name()).collect();

    assert_eq!(names.len(), 12);
    assert_eq!(names.iter().collect::<HashSet<_>>().len(), 12);
    assert_eq!(names[0], "SessionOverview");
    assert!(names.contains(&"HostMetrics"));
    assert!(names.contains(&"ResourceLimits"));
}

#[test]
fn test_duplicate_registration_rejected() {
    let sinks = MemorySinkFactory::new();
    let mut registry = MetricRegistry::with_default_metrics(&sinks).unwrap();
    let err = registry
        .register_metric(Box::new(SessionOverview), &sinks)
        .unwrap_err();
    assert!(matches!(err, OramonError::DuplicateMetric(name) if name == "SessionOverview"));
    assert_eq!(registry.len(), 12);
}

#[test]
fn test_lookup_unknown_metric() {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    assert!(matches!(
        registry.get_metric("NoSuchMetric"),
        Err(OramonError::MetricNotFound(_))
    ));
}

#[test]
fn test_disabled_metrics_are_not_collected() {
    let mut registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    registry
        .apply_disabled(&["TablespaceUsage".to_string(), "HostMetrics".to_string()])
        .unwrap();

    let conn = demo_connection();
    let bundle = registry.collect_all(&conn, &CollectOptions::default());

    assert_eq!(bundle.len(), 10);
    assert!(!bundle.contains("TablespaceUsage"));
    assert!(!bundle.contains("HostMetrics"));
    assert!(bundle.contains("SessionOverview"));
    assert!(conn.executed().iter().all(|sql| !sql.contains("dba_tablespaces")));
    assert_eq!(registry.get_enabled_metrics().len(), 10);
}

#[test]
fn test_unknown_disabled_name_changes_nothing() {
    let mut registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    let result = registry.apply_disabled(&["TopSessions".to_string(), "Bogus".to_string()]);
    assert!(result.is_err());
    assert!(registry.get_metric("TopSessions").unwrap().is_enabled());
}

#[test]
fn test_failing_metric_does_not_stop_others() {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    let conn = FixtureConnection::default()
        .with_error("dba_tablespaces", "ORA-01031: insufficient privileges")
        .with_rows(
            "v$resource_limit",
            vec![vec![
                SqlValue::from("sessions"),
                SqlValue::Int(10),
                SqlValue::Int(20),
                SqlValue::from("472"),
            ]],
        );

    let bundle = registry.collect_all(&conn, &CollectOptions::default());

    // every enabled metric has an entry, failed ones hold no data
    assert_eq!(bundle.len(), 12);
    assert_eq!(bundle.entry("TablespaceUsage"), Some(None));
    assert!(bundle.get("ResourceLimits").is_some());
    assert!(bundle.get("HostMetrics").is_some());
    assert!(!bundle.connection_lost());
    assert!(conn.is_alive());
}

#[test]
fn test_categories() {
    let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
    assert_eq!(registry.categories(), Category::ALL.to_vec());

    let storage: Vec<&str> = registry
        .get_metrics_by_category(Category::Storage)
        .iter()
        .map(|u| u.name())
        .collect();
    assert!(storage.contains(&"TablespaceUsage"));
    assert!(registry
        .get_metrics_by_category(Category::Sessions)
        .iter()
        .all(|u| u.descriptor().category == Category::Sessions));
}

#[test]
fn test_register_custom_set() {
    let sinks = MemorySinkFactory::new();
    let mut registry = MetricRegistry::new();
    registry.register_metric(Box::new(TablespaceUsage), &sinks).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.get_metric("TablespaceUsage").is_ok());
}
