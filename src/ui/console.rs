use colored::*;

use super::formatters::{format_table, format_value, generic_details, truncate};
use crate::core::analysis::{GroupBy, SessionLog, SessionStats};
use crate::core::monitor::{
    Alert, AlertSeverity, Category, Details, HistoryRows, MetricRegistry, MonitorState, Presenter,
    TickHistory, TickReport,
};

/// Terminal presenter for monitoring sessions
pub struct ConsolePresenter {
    details: bool,
}

impl ConsolePresenter {
    pub fn new(details: bool) -> Self {
        Self { details }
    }
}

impl Presenter for ConsolePresenter {
    fn on_tick(&mut self, registry: &MetricRegistry, report: &TickReport, history: &TickHistory) {
        print_report(registry, report, self.details);
        print_trend(history);
    }

    fn on_connectivity_lost(&mut self, reason: &str) {
        println!();
        println!("{}", format!("✗ {}", reason).red().bold());
        println!(
            "{}",
            "Monitoring paused. Reconnect and press 's' to resume.".dimmed()
        );
    }

    fn on_state_change(&mut self, state: MonitorState) {
        match state {
            MonitorState::Active => println!("{}", "● Monitoring active".green().bold()),
            MonitorState::Idle => println!("{}", "○ Monitoring idle".yellow()),
        }
    }
}

fn print_section_header(title: &str) {
    println!("\n{}", title.bold().green());
    println!("{}", "-".repeat(title.chars().count()));
}

/// Print one tick: per-metric summaries (and optionally details), then alerts
pub fn print_report(registry: &MetricRegistry, report: &TickReport, details: bool) {
    println!("\n{}", format!("ORACLE MONITOR  {}", report.sample_id).bold().bright_cyan());
    println!("{}", "=".repeat(80));

    for (name, data) in report.bundle.iter() {
        let unit = match registry.get_metric(name) {
            Ok(unit) => unit,
            Err(_) => continue,
        };
        print_section_header(unit.descriptor().display_name);

        let data = match data {
            Some(data) => data,
            None => {
                println!("  {}", "No data".dimmed());
                continue;
            }
        };

        match unit.render_summary(data) {
            Some(summary) => {
                for (label, value) in summary.iter() {
                    println!("  {}: {}", label, value.white().bold());
                }
            }
            None => println!("  {}", "Collected".dimmed()),
        }

        if details {
            let table = unit
                .render_details(data)
                .unwrap_or_else(|| generic_details(data));
            if !table.rows.is_empty() {
                println!();
                for line in format_table(&table) {
                    println!("    {}", line);
                }
            }
        }
    }

    print_alerts(&report.alerts);

    println!();
    println!(
        "{}",
        format!(
            "{} metric(s) collected, {} log record(s), {} row(s) stored in {} ms",
            report.bundle.collected_count(),
            report.records_logged,
            report.rows_stored,
            report.elapsed_ms
        )
        .dimmed()
    );
}

pub fn print_alerts(alerts: &[Alert]) {
    if alerts.is_empty() {
        return;
    }
    print_section_header("ALERTS");
    for alert in alerts {
        let tag = format!("[{}]", alert.severity);
        let tag = match alert.severity {
            AlertSeverity::Critical => tag.red().bold(),
            AlertSeverity::Warning => tag.yellow().bold(),
            AlertSeverity::Info => tag.cyan(),
        };
        println!("  {} {}", tag, alert.message);
    }
}

fn print_trend(history: &TickHistory) {
    let latest = match history.latest().and_then(|t| t.total_sessions) {
        Some(total) => total,
        None => return,
    };
    let delta = match history.session_delta() {
        Some(d) if d > 0.0 => format!(" (+{})", d).yellow(),
        Some(d) if d < 0.0 => format!(" ({})", d).green(),
        _ => "".normal(),
    };
    println!(
        "{} {}{}  {}",
        "Sessions:".white(),
        latest,
        delta,
        format!("[{} tick(s) in history]", history.len()).dimmed()
    );
}

/// Registered metrics grouped by category
pub fn print_metric_list(registry: &MetricRegistry) {
    println!("\n{}", "REGISTERED METRICS".bold().bright_cyan());
    println!("{}", "=".repeat(80));

    for category in Category::ALL {
        let units = registry.get_metrics_by_category(category);
        if units.is_empty() {
            continue;
        }
        print_section_header(&category.as_str().to_uppercase());
        for unit in units {
            let descriptor = unit.descriptor();
            let status = if unit.is_enabled() {
                "enabled".green()
            } else {
                "disabled".red()
            };
            println!(
                "  {:<18} {:<10} {}",
                descriptor.name,
                status,
                descriptor.description.dimmed()
            );
        }
    }
    println!();
}

/// Stored history rows, newest first
pub fn print_history(title: &str, rows: &HistoryRows) {
    println!("\n{}", format!("{} HISTORY", title.to_uppercase()).bold().bright_cyan());
    println!("{}", "=".repeat(80));
    if rows.is_empty() {
        println!("  {}", "No stored samples".dimmed());
        return;
    }

    let mut table = Details::new(rows.columns.iter().map(String::as_str));
    for row in &rows.rows {
        table.push_row(row.iter().map(format_value).collect());
    }
    for line in format_table(&table) {
        println!("  {}", line);
    }
    println!();
    println!("{}", format!("{} row(s)", rows.len()).dimmed());
}

fn print_session_line(stats: &SessionStats, figure: String) {
    println!(
        "  SID={} SQL_ID={} {} samples={} user={} program={}",
        stats.sid,
        stats.sql_id,
        figure.white().bold(),
        stats.samples,
        stats.username,
        truncate(&stats.program, 40)
    );
}

/// Top consumers in a session log, optionally grouped
pub fn print_session_analysis(log: &SessionLog, top: usize, group: Option<GroupBy>) {
    println!("\n{}", "SESSION LOG ANALYSIS".bold().bright_cyan());
    println!("{}", "=".repeat(80));
    if log.is_empty() {
        println!("  {}", "No session entries found".dimmed());
        return;
    }
    println!(
        "{}",
        format!("{} sample(s), {} session(s)", log.records(), log.sessions().len()).dimmed()
    );

    print_section_header("Top sessions by cumulative CPU");
    for stats in log.top_by_cpu(top) {
        print_session_line(stats, format!("CPU={:.2}s", stats.cpu_seconds));
    }

    print_section_header("Top sessions by cumulative logical reads");
    for stats in log.top_by_reads(top) {
        print_session_line(stats, format!("reads={:.2}MB", stats.logical_reads_mb));
    }

    if let Some(by) = group {
        print_section_header(&format!("Top groups by {}", by));
        for g in log.group_by(by, top) {
            println!(
                "  {} -> samples={} sessions={} CPU={:.2}s reads={:.2}MB sql={}",
                g.key.white().bold(),
                g.samples,
                g.sessions,
                g.cpu_seconds,
                g.logical_reads_mb,
                g.sample_sql_id
            );
        }
    }
    println!();
}
