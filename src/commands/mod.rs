// Command handlers module
pub mod analyze;
pub mod collect;
pub mod completions;
pub mod config;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod session;
