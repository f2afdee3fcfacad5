//! Metric registry and per-tick result bundle.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::connection::Connection;
use super::metric::{Category, CollectOptions, Metric, MetricData};
use super::metrics::builtin_metrics;
use super::sink::SinkFactory;
use super::storage::HistoryStore;
use super::unit::MetricUnit;
use crate::error::{OramonError, Result};

/// Results of one tick, keyed by metric name in registry order.
///
/// An entry with `None` means the metric was enabled but produced no data.
/// Disabled metrics, and metrics skipped after a lost connection, are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    entries: Vec<(String, Option<MetricData>)>,
    connection_lost: bool,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `name`
    pub fn insert(&mut self, name: impl Into<String>, data: Option<MetricData>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((name, data)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Data for `name`; `None` if absent or empty
    pub fn get(&self, name: &str) -> Option<&MetricData> {
        self.entry(name).flatten()
    }

    /// `Some(None)` distinguishes "collected nothing" from "absent"
    pub fn entry(&self, name: &str) -> Option<Option<&MetricData>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&MetricData>)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_ref()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that actually carry data
    pub fn collected_count(&self) -> usize {
        self.entries.iter().filter(|(_, d)| d.is_some()).count()
    }

    pub fn connection_lost(&self) -> bool {
        self.connection_lost
    }

    pub fn mark_connection_lost(&mut self) {
        self.connection_lost = true;
    }
}

impl Serialize for Bundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, data) in &self.entries {
            map.serialize_entry(name, data)?;
        }
        map.end()
    }
}

/// Owns every metric unit, keyed by unique name, in registration order
#[derive(Debug, Default)]
pub struct MetricRegistry {
    units: Vec<MetricUnit>,
    index: HashMap<&'static str, usize>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in metric, each with a sink from `sinks`
    pub fn with_default_metrics(sinks: &dyn SinkFactory) -> Result<Self> {
        let mut registry = Self::new();
        for metric in builtin_metrics() {
            registry.register_metric(metric, sinks)?;
        }
        log::debug!("Registered {} metrics", registry.len());
        Ok(registry)
    }

    /// Wrap `metric` in a unit with its own sink and register it
    pub fn register_metric(&mut self, metric: Box<dyn Metric>, sinks: &dyn SinkFactory) -> Result<()> {
        let name = metric.descriptor().name;
        if self.index.contains_key(name) {
            return Err(OramonError::duplicate_metric(name));
        }
        let sink = sinks.open(name)?;
        self.register(MetricUnit::new(metric, sink))
    }

    /// Add a unit; names must be unique
    pub fn register(&mut self, unit: MetricUnit) -> Result<()> {
        let name = unit.name();
        if self.index.contains_key(name) {
            return Err(OramonError::duplicate_metric(name));
        }
        self.index.insert(name, self.units.len());
        self.units.push(unit);
        Ok(())
    }

    pub fn get_metric(&self, name: &str) -> Result<&MetricUnit> {
        self.index
            .get(name)
            .map(|&i| &self.units[i])
            .ok_or_else(|| OramonError::metric_not_found(name))
    }

    pub fn get_metric_mut(&mut self, name: &str) -> Result<&mut MetricUnit> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.units[i]),
            None => Err(OramonError::metric_not_found(name)),
        }
    }

    pub fn get_all_metrics(&self) -> &[MetricUnit] {
        &self.units
    }

    pub fn get_enabled_metrics(&self) -> Vec<&MetricUnit> {
        self.units.iter().filter(|u| u.is_enabled()).collect()
    }

    pub fn get_metrics_by_category(&self, category: Category) -> Vec<&MetricUnit> {
        self.units
            .iter()
            .filter(|u| u.descriptor().category == category)
            .collect()
    }

    /// Categories that have at least one unit, in display order
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> =
            self.units.iter().map(|u| u.descriptor().category).collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        self.get_metric_mut(name)?.set_enabled(enabled);
        Ok(())
    }

    /// Disable exactly `names`, enabling everything else. Unknown names are
    /// rejected before any flag changes.
    pub fn apply_disabled(&mut self, names: &[String]) -> Result<()> {
        if let Some(unknown) = names.iter().find(|n| !self.index.contains_key(n.as_str())) {
            return Err(OramonError::metric_not_found(unknown.as_str()));
        }
        for unit in &mut self.units {
            let disabled = names.iter().any(|n| n == unit.name());
            unit.set_enabled(!disabled);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Collect every enabled unit, in order.
    ///
    /// A failing unit contributes `None` and the rest still run, unless the
    /// failure left the connection dead: then the tick stops and the bundle is
    /// marked as having lost its connection.
    pub fn collect_all(&self, conn: &dyn Connection, options: &CollectOptions) -> Bundle {
        let mut bundle = Bundle::new();
        for unit in self.units.iter().filter(|u| u.is_enabled()) {
            let outcome = unit.collect_with_status(conn, options);
            bundle.insert(unit.name(), outcome.data);
            if outcome.failed && (outcome.connection_lost || !conn.is_alive()) {
                log::error!(
                    "Connection lost while collecting {}; skipping remaining metrics",
                    unit.name()
                );
                bundle.mark_connection_lost();
                break;
            }
        }
        bundle
    }

    /// Log every entry of the bundle. Returns the number of records written.
    pub fn log_all(&self, bundle: &Bundle, sample_id: &str) -> usize {
        let mut written = 0;
        for (name, data) in bundle.iter() {
            let Some(data) = data else { continue };
            let Ok(unit) = self.get_metric(name) else {
                log::warn!("Bundle entry {} has no registered metric", name);
                continue;
            };
            match unit.log_data(Some(data), sample_id) {
                Ok(()) => written += 1,
                Err(e) => log::warn!(target: unit.log_target(), "Failed to log data: {}", e),
            }
        }
        written
    }

    /// Initialize storage for every unit, enabled or not. Returns how many
    /// units failed.
    pub fn init_storage(&self, store: &HistoryStore) -> usize {
        let mut failures = 0;
        for unit in &self.units {
            if let Err(e) = unit.init_storage(store) {
                log::error!(target: unit.log_target(), "Failed to initialize storage: {}", e);
                failures += 1;
            }
        }
        failures
    }

    /// Store every entry of the bundle. A failing unit does not stop the
    /// others. Returns the total number of rows inserted.
    pub fn store_all(&self, store: &mut HistoryStore, bundle: &Bundle, sample_id: &str) -> usize {
        let mut rows = 0;
        for (name, data) in bundle.iter() {
            let Ok(unit) = self.get_metric(name) else { continue };
            match unit.store_data(store, data, sample_id) {
                Ok(n) => rows += n,
                Err(e) => log::error!(target: unit.log_target(), "Failed to store data: {}", e),
            }
        }
        rows
    }

    /// Flush every sink
    pub fn close(&self) {
        for unit in &self.units {
            if let Err(e) = unit.flush() {
                log::warn!(target: unit.log_target(), "Failed to flush log: {}", e);
            }
        }
    }
}

impl Drop for MetricRegistry {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monitor::sink::MemorySinkFactory;

    #[test]
    fn test_default_registry_order() {
        let registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
        let names: Vec<_> = registry.get_all_metrics().iter().map(|u| u.name()).collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "SessionOverview");
        assert_eq!(names[11], "ResourceLimits");
        assert_eq!(registry.categories(), Category::ALL.to_vec());
    }

    #[test]
    fn test_bundle_entry_distinguishes_absent_from_empty() {
        let mut bundle = Bundle::new();
        bundle.insert("A", None);
        assert_eq!(bundle.entry("A"), Some(None));
        assert_eq!(bundle.entry("B"), None);
        assert!(bundle.get("A").is_none());
    }

    #[test]
    fn test_apply_disabled_rejects_unknown() {
        let mut registry = MetricRegistry::with_default_metrics(&MemorySinkFactory::new()).unwrap();
        let result = registry.apply_disabled(&["TopSessions".into(), "Nope".into()]);
        assert!(matches!(result, Err(OramonError::MetricNotFound(_))));
        assert_eq!(registry.get_enabled_metrics().len(), 12);

        registry.apply_disabled(&["TopSessions".into()]).unwrap();
        assert!(!registry.get_metric("TopSessions").unwrap().is_enabled());
        assert_eq!(registry.get_enabled_metrics().len(), 11);
    }

    #[test]
    fn test_bundle_serializes_as_map() {
        let mut bundle = Bundle::new();
        bundle.insert("B", None);
        bundle.insert("A", Some(MetricData::default()));
        assert_eq!(serde_json::to_string(&bundle).unwrap(), r#"{"B":null,"A":{}}"#);
    }
}
