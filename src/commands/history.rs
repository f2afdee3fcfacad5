//! Read stored metric history back from the SQLite database.

use anyhow::{bail, Context, Result};
use clap::ArgMatches;

use super::session;
use crate::core::monitor::{HistoryStore, MetricUnit};
use crate::ui;

pub const DEFAULT_LIMIT: usize = 200;
const TABLESPACE_COLUMN: &str = "tablespace";

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = session::load_config(matches)?;
    let registry = session::build_registry(&config)?;

    let name = matches
        .get_one::<String>("metric")
        .context("A metric name is required")?;
    let unit = registry.get_metric(name)?;
    let table = match unit.storage_table() {
        Some(table) => table,
        None => bail!("{} does not keep history", name),
    };

    let store = HistoryStore::open(&config.monitoring.db_path).with_context(|| {
        format!("Failed to open history database {:?}", config.monitoring.db_path)
    })?;
    // A database that never saw a tick has no tables yet
    unit.init_storage(&store)?;

    if matches.get_flag("tablespaces") {
        require_tablespace_column(&store, unit, table)?;
        for tablespace in store.distinct_values(table, TABLESPACE_COLUMN)? {
            println!("{}", tablespace);
        }
        return Ok(());
    }

    let limit = matches.get_one::<usize>("limit").copied().unwrap_or(DEFAULT_LIMIT);
    let rows = match matches.get_one::<String>("tablespace") {
        Some(tablespace) => {
            require_tablespace_column(&store, unit, table)?;
            store.recent_where(table, TABLESPACE_COLUMN, tablespace, limit)?
        }
        None => store.recent(table, limit)?,
    };

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&rows.to_records())?);
    } else {
        ui::print_history(unit.descriptor().display_name, &rows);
    }
    Ok(())
}

fn require_tablespace_column(store: &HistoryStore, unit: &MetricUnit, table: &str) -> Result<()> {
    if store.table_columns(table)?.iter().any(|c| c == TABLESPACE_COLUMN) {
        Ok(())
    } else {
        bail!("{} history is not kept per tablespace", unit.name())
    }
}
