//! Offline report over the TopSessions data log.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde_json::json;

use super::session;
use crate::core::analysis::{GroupBy, SessionLog, SESSION_METRIC};
use crate::core::monitor::JsonlSinkFactory;
use crate::ui;

pub const DEFAULT_TOP: usize = 10;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = session::load_config(matches)?;
    let path = match matches.get_one::<PathBuf>("log-file") {
        Some(path) => path.clone(),
        None => JsonlSinkFactory::new(&config.monitoring.log_dir).path_for(SESSION_METRIC),
    };

    let log = SessionLog::load(&path)
        .with_context(|| format!("Failed to read session log {:?}", path))?;
    let top = matches.get_one::<usize>("top").copied().unwrap_or(DEFAULT_TOP);
    let group = matches
        .get_one::<String>("group-by")
        .map(|g| g.parse::<GroupBy>())
        .transpose()?;

    if matches.get_flag("json") {
        let report = json!({
            "log_file": path.display().to_string(),
            "samples": log.records(),
            "skipped_lines": log.skipped_lines(),
            "top_cpu": log.top_by_cpu(top),
            "top_reads": log.top_by_reads(top),
            "groups": group.map(|g| log.group_by(g, top)),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    ui::print_session_analysis(&log, top, group);
    Ok(())
}
