use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::monitor::{
    validate_interval, AlertPolicy, AlertThresholds, CollectOptions, MonitorSettings,
    DEFAULT_INTERVAL_SECS,
};
use crate::error::OramonError;

pub const CONFIG_ENV: &str = "ORAMON_CONFIG";
pub const PASSWORD_ENV: &str = "ORAMON_PASSWORD";

const MAX_ROW_LIMIT: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Connection parameters of the monitored database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1521,
            service_name: "ORCL".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// EZConnect string: `host:port/service`
    pub fn connect_string(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.service_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub interval_seconds: u64,
    pub row_limit: usize,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub alert_policy: AlertPolicy,
    pub alert_thresholds: AlertThresholds,
    /// Metric names to skip during collection
    pub disabled_metrics: Vec<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECS,
            row_limit: 20,
            log_dir: PathBuf::from("logs"),
            db_path: PathBuf::from("logs").join("monitor_history.db"),
            alert_policy: AlertPolicy::default(),
            alert_thresholds: AlertThresholds::default(),
            disabled_metrics: Vec::new(),
        }
    }
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            interval: self.interval(),
            collect: CollectOptions::with_row_limit(self.row_limit),
            thresholds: self.alert_thresholds.clone(),
            alert_policy: self.alert_policy,
        }
    }
}

impl Config {
    /// Load from `ORAMON_CONFIG` or the default location
    pub fn load() -> Result<Self> {
        let path = Self::resolve_path(None)?;
        Self::load_from(&path)
    }

    /// Load from `path`. A missing file yields defaults; fields missing from
    /// the file keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            if data.trim().is_empty() {
                Config::default()
            } else {
                serde_json::from_str(&data)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            }
        } else {
            log::debug!("No config file at {:?}, using defaults", path);
            Config::default()
        };

        config.apply_password_override(env::var(PASSWORD_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        let data =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, data)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Explicit path first, then `ORAMON_CONFIG`, then the default location
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        match env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Self::default_path(),
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("oramon").join("config.json"))
    }

    pub fn apply_password_override(&mut self, password: Option<String>) {
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.database.password = password;
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let monitoring = &self.monitoring;
        validate_interval(monitoring.interval())?;

        if !(1..=MAX_ROW_LIMIT).contains(&monitoring.row_limit) {
            return Err(OramonError::config(format!(
                "row_limit must be between 1 and {}, got {}",
                MAX_ROW_LIMIT, monitoring.row_limit
            )));
        }

        monitoring
            .alert_thresholds
            .validate()
            .map_err(OramonError::config)?;

        if self.database.port == 0 {
            return Err(OramonError::config("database port must be non-zero"));
        }

        Ok(())
    }

    /// Copy safe to print: the password is masked
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if !copy.database.password.is_empty() {
            copy.database.password = "********".to_string();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_merges_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"monitoring": {"interval_seconds": 30}}"#).unwrap();
        assert_eq!(config.monitoring.interval_seconds, 30);
        assert_eq!(config.monitoring.row_limit, 20);
        assert_eq!(config.monitoring.alert_thresholds.max_blocked_sessions, 10.0);
        assert_eq!(config.database.port, 1521);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_out_of_range() {
        let mut config = Config::default();
        config.monitoring.interval_seconds = 1;
        assert!(matches!(config.validate(), Err(OramonError::Config(_))));
    }

    #[test]
    fn test_row_limit_bounds() {
        let mut config = Config::default();
        config.monitoring.row_limit = 0;
        assert!(config.validate().is_err());
        config.monitoring.row_limit = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_override_and_redaction() {
        let mut config = Config::default();
        config.apply_password_override(Some(String::new()));
        assert!(config.database.password.is_empty());
        config.apply_password_override(Some("secret".into()));
        assert_eq!(config.database.password, "secret");
        assert_eq!(config.redacted().database.password, "********");
    }

    #[test]
    fn test_alert_policy_names() {
        let config: Config =
            serde_json::from_str(r#"{"monitoring": {"alert_policy": "on_change"}}"#).unwrap();
        assert_eq!(config.monitoring.alert_policy, AlertPolicy::OnChange);
    }

    #[test]
    fn test_connect_string() {
        assert_eq!(DatabaseConfig::default().connect_string(), "localhost:1521/ORCL");
    }
}
