use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;

use super::session;
use crate::core::monitor::NullPresenter;
use crate::platform;
use crate::ui;

/// One collection pass: alerts, logs and history, then print the result
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = session::load_config(matches)?;
    let mut registry = session::build_registry(&config)?;
    session::select_metrics(&mut registry, matches)?;

    let fixture = matches.get_one::<PathBuf>("fixture").map(PathBuf::as_path);
    let conn = platform::open_connection(&config.database, fixture)?;

    let mut monitor = session::build_monitor(&config, registry, Box::new(NullPresenter))?;
    monitor.attach(conn);
    let report = monitor.collect_now().context("Collection failed")?;
    monitor.close();

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ui::print_report(monitor.registry(), &report, matches.get_flag("details"));
    }

    if report.connection_lost {
        anyhow::bail!("Connection lost during collection");
    }
    Ok(())
}
