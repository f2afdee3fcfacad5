//! Setup shared by the commands that talk to the database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::config::Config;
use crate::core::monitor::{
    HistoryStore, JsonlSinkFactory, MetricRegistry, Monitor, Presenter, SinkFactory,
};

/// Stream name of the alert log
pub const ALERT_STREAM: &str = "alerts";

/// Load the config named by `--config` (or its defaults) and apply the
/// global path overrides.
pub fn load_config(matches: &ArgMatches) -> Result<Config> {
    let explicit = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let path = Config::resolve_path(explicit)?;
    let mut config = Config::load_from(&path)?;

    if let Some(dir) = matches.get_one::<PathBuf>("log-dir") {
        config.monitoring.log_dir = dir.clone();
    }
    if let Some(db) = matches.get_one::<PathBuf>("db-path") {
        config.monitoring.db_path = db.clone();
    }
    Ok(config)
}

/// Registry with every built-in metric logging under `log_dir`
pub fn build_registry(config: &Config) -> Result<MetricRegistry> {
    let sinks = JsonlSinkFactory::new(&config.monitoring.log_dir);
    let mut registry = MetricRegistry::with_default_metrics(&sinks)
        .with_context(|| format!("Failed to open logs in {:?}", config.monitoring.log_dir))?;
    registry
        .apply_disabled(&config.monitoring.disabled_metrics)
        .context("Invalid disabled_metrics entry")?;
    Ok(registry)
}

/// Idle monitor wired to the configured logs and history database
pub fn build_monitor(
    config: &Config,
    registry: MetricRegistry,
    presenter: Box<dyn Presenter>,
) -> Result<Monitor> {
    let sinks = JsonlSinkFactory::new(&config.monitoring.log_dir);
    let alert_sink = sinks.open(ALERT_STREAM)?;
    let store = HistoryStore::open(&config.monitoring.db_path).with_context(|| {
        format!("Failed to open history database {:?}", config.monitoring.db_path)
    })?;

    let monitor = Monitor::new(registry, store, alert_sink, config.monitoring.settings())?;
    Ok(monitor.with_presenter(presenter))
}

/// Enable only the metrics named by `--metric`, if any were given
pub fn select_metrics(registry: &mut MetricRegistry, matches: &ArgMatches) -> Result<()> {
    let selected: Vec<String> = match matches.get_many::<String>("metric") {
        Some(names) => names.cloned().collect(),
        None => return Ok(()),
    };
    for name in &selected {
        registry.get_metric(name)?;
    }
    let others: Vec<String> = registry
        .get_all_metrics()
        .iter()
        .map(|u| u.name().to_string())
        .filter(|n| !selected.contains(n))
        .collect();
    registry.apply_disabled(&others)?;
    Ok(())
}
