//! Scripted connection for offline runs and tests.
//!
//! Queries are answered from a list of responses keyed by a SQL substring;
//! the first response whose pattern appears in the statement wins. A fixture
//! file looks like:
//!
//! ```json
//! {
//!   "describe": "fixture:demo",
//!   "responses": [
//!     { "match": "v$statname", "rows": [[12]] },
//!     { "match": "dba_tablespaces", "error": "ORA-01031: insufficient privileges" },
//!     { "match": "v$resource_limit", "disconnect": true }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::monitor::{Connection, QueryError, QueryParams, Row, SqlValue};

const LOST_MESSAGE: &str = "ORA-03113: end-of-file on communication channel";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureResponse {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(default)]
    pub rows: Vec<Vec<SqlValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Drop the connection when this query runs
    #[serde(default)]
    pub disconnect: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    describe: Option<String>,
    #[serde(default)]
    responses: Vec<FixtureResponse>,
}

/// Flips a [`FixtureConnection`] to dead from outside, e.g. after it has
/// been handed to a monitor.
#[derive(Debug, Clone)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    pub fn kill(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct FixtureConnection {
    label: String,
    responses: Vec<FixtureResponse>,
    alive: Arc<AtomicBool>,
    executed: Mutex<Vec<String>>,
    last_params: Mutex<Option<QueryParams>>,
}

impl Default for FixtureConnection {
    fn default() -> Self {
        Self {
            label: "fixture".to_string(),
            responses: Vec::new(),
            alive: Arc::new(AtomicBool::new(true)),
            executed: Mutex::new(Vec::new()),
            last_params: Mutex::new(None),
        }
    }
}

impl FixtureConnection {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: FixtureFile =
            serde_json::from_str(json).with_context(|| "Failed to parse fixture")?;
        let mut conn = FixtureConnection::default();
        if let Some(label) = file.describe {
            conn.label = label;
        }
        conn.responses = file.responses;
        Ok(conn)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {:?}", path))?;
        let mut conn = Self::from_json(&json)
            .with_context(|| format!("Invalid fixture file: {:?}", path))?;
        if conn.label == "fixture" {
            conn.label = format!("fixture:{}", path.display());
        }
        log::debug!("Loaded {} fixture responses from {:?}", conn.responses.len(), path);
        Ok(conn)
    }

    pub fn with_rows(mut self, pattern: &str, rows: Vec<Vec<SqlValue>>) -> Self {
        self.responses.push(FixtureResponse {
            pattern: pattern.to_string(),
            rows,
            ..Default::default()
        });
        self
    }

    pub fn with_error(mut self, pattern: &str, message: &str) -> Self {
        self.responses.push(FixtureResponse {
            pattern: pattern.to_string(),
            error: Some(message.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn with_disconnect(mut self, pattern: &str) -> Self {
        self.responses.push(FixtureResponse {
            pattern: pattern.to_string(),
            disconnect: true,
            ..Default::default()
        });
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Statements executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn last_params(&self) -> Option<QueryParams> {
        self.last_params.lock().clone()
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch(Arc::clone(&self.alive))
    }

    fn respond(&self, sql: &str) -> std::result::Result<Vec<Row>, QueryError> {
        let response = self
            .responses
            .iter()
            .find(|r| sql.contains(r.pattern.as_str()))
            .ok_or_else(|| {
                QueryError::database("ORA-00942: table or view does not exist (no fixture response)")
            })?;

        if response.disconnect {
            self.kill();
            return Err(QueryError::ConnectionLost(LOST_MESSAGE.to_string()));
        }
        if let Some(message) = &response.error {
            return Err(QueryError::database(message.clone()));
        }
        Ok(response.rows.iter().cloned().map(Row::from).collect())
    }
}

impl Connection for FixtureConnection {
    fn execute(&self, sql: &str, params: &QueryParams) -> std::result::Result<Vec<Row>, QueryError> {
        if !self.is_alive() {
            return Err(QueryError::ConnectionLost(LOST_MESSAGE.to_string()));
        }
        self.executed.lock().push(sql.to_string());
        *self.last_params.lock() = Some(params.clone());
        self.respond(sql)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
