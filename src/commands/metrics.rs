use anyhow::Result;
use clap::ArgMatches;
use serde_json::json;

use super::session;
use crate::core::monitor::{Category, MetricUnit};
use crate::ui;

/// List registered metrics, optionally limited to one category
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = session::load_config(matches)?;
    let registry = session::build_registry(&config)?;

    let category = match matches.get_one::<String>("category") {
        Some(name) => Some(name.parse::<Category>()?),
        None => None,
    };

    if matches.get_flag("json") {
        let units: Vec<&MetricUnit> = match category {
            Some(c) => registry.get_metrics_by_category(c),
            None => registry.get_all_metrics().iter().collect(),
        };
        let listing: Vec<_> = units
            .iter()
            .map(|unit| {
                let d = unit.descriptor();
                json!({
                    "name": d.name,
                    "display_name": d.display_name,
                    "category": d.category,
                    "description": d.description,
                    "enabled": unit.is_enabled(),
                    "log_file": unit.log_location(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if let Some(category) = category {
        for unit in registry.get_metrics_by_category(category) {
            let state = if unit.is_enabled() { "enabled" } else { "disabled" };
            println!("{}\t{}\t{}", unit.name(), state, unit.descriptor().description);
        }
        return Ok(());
    }

    ui::print_metric_list(&registry);
    Ok(())
}
