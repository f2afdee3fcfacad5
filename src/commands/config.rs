use std::path::PathBuf;

use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;

use crate::core::config::Config;
use crate::ui;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", sub_matches)) => show(sub_matches),
        Some(("path", sub_matches)) => path(sub_matches),
        Some(("init", sub_matches)) => init(sub_matches),
        _ => {
            println!("Use 'oramon config --help' for more information.");
            Ok(())
        }
    }
}

fn config_path(matches: &ArgMatches) -> Result<PathBuf> {
    Config::resolve_path(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
}

/// Effective configuration with the password masked
fn show(matches: &ArgMatches) -> Result<()> {
    let path = config_path(matches)?;
    let config = Config::load_from(&path)?;
    if !path.exists() {
        ui::warn(&format!("{} does not exist, showing defaults", path.display()));
    }
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

fn path(matches: &ArgMatches) -> Result<()> {
    let path = config_path(matches)?;
    let status = if path.exists() {
        "exists".green()
    } else {
        "not created".dimmed()
    };
    println!("{} ({})", path.display(), status);
    Ok(())
}

/// Write a default config file
fn init(matches: &ArgMatches) -> Result<()> {
    let path = config_path(matches)?;
    if path.exists() && !matches.get_flag("force") {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save_to(&path)?;
    ui::success(&format!("Wrote default configuration to {}", path.display()));
    ui::info("Set database.username and database.password (or ORAMON_PASSWORD) before connecting.");
    Ok(())
}
