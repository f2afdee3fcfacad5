//! Interactive monitoring session.
//!
//! The runtime loop blocks the calling thread. A reader thread turns stdin
//! lines into commands and Ctrl-C requests shutdown.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;
use tokio::sync::mpsc::UnboundedSender;

use super::session;
use crate::core::monitor::{MonitorCommand, MonitorRuntime, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};
use crate::error::OramonError;
use crate::platform;
use crate::ui::ConsolePresenter;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = session::load_config(matches)?;
    if let Some(secs) = matches.get_one::<u64>("interval") {
        config.monitoring.interval_seconds = *secs;
        config.validate()?;
    }

    let mut registry = session::build_registry(&config)?;
    session::select_metrics(&mut registry, matches)?;

    let fixture = matches.get_one::<PathBuf>("fixture").cloned();
    let conn = platform::open_connection(&config.database, fixture.as_deref())?;

    let presenter = Box::new(ConsolePresenter::new(matches.get_flag("details")));
    let mut monitor = session::build_monitor(&config, registry, presenter)?;
    monitor.attach(conn);

    let database = config.database.clone();
    let runtime = MonitorRuntime::new(monitor).with_connector(Box::new(move || {
        platform::open_connection(&database, fixture.as_deref())
            .map_err(|e| OramonError::other(format!("{:#}", e)))
    }));
    let commands = runtime.sender();

    let ctrlc_commands = commands.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("{}", "Stopping monitor...".yellow().bold());
        let _ = ctrlc_commands.send(MonitorCommand::Shutdown);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    print_help();
    if !matches.get_flag("paused") {
        let _ = commands.send(MonitorCommand::Start);
    }
    spawn_input_reader(commands);

    runtime.run()?;
    Ok(())
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}  collect now", "c / Enter".cyan());
    println!("  {}          pause interval collection", "p".cyan());
    println!("  {}          start or resume", "s".cyan());
    println!("  {}          reconnect and resume", "r".cyan());
    println!(
        "  {}   set interval ({}-{}s)",
        "i <secs>".cyan(),
        MIN_INTERVAL_SECS,
        MAX_INTERVAL_SECS
    );
    println!("  {}          quit", "q".cyan());
}

/// Map one input line to a command
pub fn parse_command(line: &str) -> std::result::Result<MonitorCommand, String> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None | Some("c") => Ok(MonitorCommand::CollectNow),
        Some("p") => Ok(MonitorCommand::Stop),
        Some("s") => Ok(MonitorCommand::Start),
        Some("r") => Ok(MonitorCommand::Reconnect),
        Some("q") => Ok(MonitorCommand::Shutdown),
        Some("i") => parts
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| MonitorCommand::SetInterval(Duration::from_secs(secs)))
            .ok_or_else(|| "usage: i <seconds>".to_string()),
        Some(other) => Err(format!("unknown command '{}'", other)),
    }
}

fn spawn_input_reader(commands: UnboundedSender<MonitorCommand>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            match parse_command(&line) {
                Ok(command) => {
                    let quit = command == MonitorCommand::Shutdown;
                    if commands.send(command).is_err() || quit {
                        break;
                    }
                }
                Err(message) => println!("{}", message.yellow()),
            }
        }
    });
}
