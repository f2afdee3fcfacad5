// Connection backends for the monitored database

pub mod fixture;
#[cfg(feature = "oracle")]
pub mod oracle;

use std::path::Path;

use anyhow::Result;

use crate::core::config::DatabaseConfig;
use crate::core::monitor::Connection;

pub use fixture::{FixtureConnection, KillSwitch};

/// Open a fixture when a path is given, the live database otherwise
pub fn open_connection(config: &DatabaseConfig, fixture: Option<&Path>) -> Result<Box<dyn Connection>> {
    if let Some(path) = fixture {
        return Ok(Box::new(FixtureConnection::load(path)?));
    }
    open_database(config)
}

#[cfg(feature = "oracle")]
fn open_database(config: &DatabaseConfig) -> Result<Box<dyn Connection>> {
    if config.username.is_empty() {
        anyhow::bail!("No database username configured (see `oramon config init`)");
    }
    let conn = self::oracle::OracleConnection::connect(config)?;
    Ok(Box::new(conn))
}

#[cfg(not(feature = "oracle"))]
fn open_database(_config: &DatabaseConfig) -> Result<Box<dyn Connection>> {
    anyhow::bail!(
        "oramon was built without Oracle support; rebuild with `--features oracle` or pass --fixture <FILE>"
    )
}
