// Terminal output

pub mod console;
pub mod formatters;

pub use console::{
    print_alerts, print_history, print_metric_list, print_report, print_session_analysis,
    ConsolePresenter,
};
pub use formatters::{format_table, format_value, generic_details};

use colored::Colorize;

/// Display a success message
pub fn success(message: &str) {
    println!("{}", message.green().bold());
}

/// Display an info message
pub fn info(message: &str) {
    println!("{}", message.cyan());
}

/// Display a warning message
pub fn warn(message: &str) {
    println!("{}", format!("Warning: {}", message).yellow().bold());
}
