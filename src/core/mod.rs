// Core business logic module

pub mod analysis;
pub mod config;
pub mod monitor;

// Re-export commonly used items
pub use config::Config;
