use std::io;
use thiserror::Error;

/// Custom error type for the oramon library
#[derive(Error, Debug)]
pub enum OramonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metric already registered: {0}")]
    DuplicateMetric(String),

    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    #[error("Query failed: {0}")]
    Query(#[from] crate::core::monitor::QueryError),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Not connected to a monitored database")]
    NotConnected,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the oramon library
pub type Result<T> = std::result::Result<T, OramonError>;

impl OramonError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        OramonError::Config(msg.into())
    }

    pub fn duplicate_metric<S: Into<String>>(name: S) -> Self {
        OramonError::DuplicateMetric(name.into())
    }

    pub fn metric_not_found<S: Into<String>>(name: S) -> Self {
        OramonError::MetricNotFound(name.into())
    }

    pub fn connection_lost<S: Into<String>>(msg: S) -> Self {
        OramonError::ConnectionLost(msg.into())
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        OramonError::Storage(msg.into())
    }

    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        OramonError::InvalidState(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        OramonError::Other(msg.into())
    }
}
