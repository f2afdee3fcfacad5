use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use clap_complete::Shell;

use oramon::commands;

fn build_cli() -> Command {
    let metric_arg = Arg::new("metric")
        .short('m')
        .long("metric")
        .value_name("NAME")
        .help("Only collect this metric (repeatable)")
        .action(ArgAction::Append);
    let fixture_arg = Arg::new("fixture")
        .long("fixture")
        .value_name("FILE")
        .help("Answer queries from a JSON fixture instead of the database")
        .value_parser(clap::value_parser!(PathBuf));
    let details_arg = Arg::new("details")
        .short('d')
        .long("details")
        .help("Show per-metric detail tables")
        .action(ArgAction::SetTrue);

    Command::new("oramon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Read-only Oracle database monitor")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Config file (default: $ORAMON_CONFIG or the user config dir)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .help("Directory for JSONL metric and alert logs")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("db-path")
                .long("db-path")
                .value_name("FILE")
                .help("SQLite history database")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("metrics")
                .about("List registered metrics")
                .arg(
                    Arg::new("category")
                        .long("category")
                        .value_name("CATEGORY")
                        .help("sessions, storage, performance or system"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the list as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("collect")
                .about("Collect every enabled metric once")
                .arg(metric_arg.clone())
                .arg(fixture_arg.clone())
                .arg(details_arg.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the tick report as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("monitor")
                .about("Collect on an interval until interrupted")
                .arg(metric_arg)
                .arg(fixture_arg)
                .arg(details_arg)
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECS")
                        .help("Seconds between collections (5-300)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("paused")
                        .long("paused")
                        .help("Connect but wait for 's' before collecting")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("Show stored samples of one metric, newest first")
                .arg(
                    Arg::new("metric")
                        .required(true)
                        .value_name("METRIC")
                        .help("Metric name, e.g. TablespaceUsage"),
                )
                .arg(
                    Arg::new("limit")
                        .short('n')
                        .long("limit")
                        .value_name("ROWS")
                        .help("Rows to show")
                        .default_value("200")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("tablespace")
                        .short('t')
                        .long("tablespace")
                        .value_name("NAME")
                        .help("Only rows of this tablespace"),
                )
                .arg(
                    Arg::new("tablespaces")
                        .long("tablespaces")
                        .help("List the tablespaces with stored samples")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("tablespace"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print rows as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("analyze")
                .about("Aggregate the TopSessions log to find top CPU and read consumers")
                .arg(
                    Arg::new("log-file")
                        .long("log-file")
                        .value_name("FILE")
                        .help("Session log to read (default: topsessions.jsonl in the log directory)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("top")
                        .long("top")
                        .value_name("N")
                        .help("Entries per ranking")
                        .default_value("10")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("group-by")
                        .long("group-by")
                        .value_name("ATTR")
                        .help("Also aggregate by an attribute")
                        .value_parser(["user", "program", "sql", "user_program", "module"]),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the report as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create the configuration file")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(
                    Command::new("init").about("Write a default config file").arg(
                        Arg::new("force")
                            .long("force")
                            .help("Overwrite an existing file")
                            .action(ArgAction::SetTrue),
                    ),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(clap::value_parser!(Shell)),
                ),
        )
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    oramon::init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("metrics", sub_matches)) => commands::metrics::execute(sub_matches),
        Some(("collect", sub_matches)) => commands::collect::execute(sub_matches),
        Some(("monitor", sub_matches)) => commands::monitor::execute(sub_matches),
        Some(("history", sub_matches)) => commands::history::execute(sub_matches),
        Some(("analyze", sub_matches)) => commands::analyze::execute(sub_matches),
        Some(("config", sub_matches)) => commands::config::execute(sub_matches),
        Some(("completions", sub_matches)) => {
            commands::completions::execute(sub_matches, &mut build_cli())
        }
        _ => Ok(()),
    }
}
