//! Alert system for monitoring database thresholds.
//!
//! Evaluates a tick's bundle against configurable thresholds and generates
//! alerts. Evaluation is pure; repetition across ticks is handled by
//! [`AlertTracker`] according to the configured [`AlertPolicy`].

use std::collections::HashSet;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::registry::Bundle;
use super::sink::LogSink;
use crate::error::Result;

/// Tablespace alerts escalate to critical this many points above the threshold
const TABLESPACE_CRITICAL_MARGIN: f64 = 5.0;

/// Alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub max_sessions: f64,         // Warning threshold (count)
    pub max_active_sessions: f64,  // Warning threshold (count)
    pub max_blocked_sessions: f64, // Critical threshold (count)
    pub max_tablespace_pct: f64,   // Warning threshold (%)
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_sessions: 500.0,
            max_active_sessions: 200.0,
            max_blocked_sessions: 10.0,
            max_tablespace_pct: 90.0,
        }
    }
}

impl AlertThresholds {
    /// Every threshold must be a positive, finite number
    pub fn validate(&self) -> std::result::Result<(), String> {
        let checks = [
            ("max_sessions", self.max_sessions),
            ("max_active_sessions", self.max_active_sessions),
            ("max_blocked_sessions", self.max_blocked_sessions),
            ("max_tablespace_pct", self.max_tablespace_pct),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be positive, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// An individual alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub metric: String,
    pub field: String,
    /// Per-object context such as a tablespace name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub value: f64,
    pub threshold: f64,
}

impl Alert {
    /// Identity of the condition, ignoring the current value
    pub fn key(&self) -> AlertKey {
        AlertKey {
            metric: self.metric.clone(),
            field: self.field.clone(),
            subject: self.subject.clone(),
        }
    }

    /// Record appended to `alerts.jsonl`
    pub fn log_record(&self) -> Value {
        json!({
            "timestamp": Utc::now().to_rfc3339(),
            "type": "alert",
            "alert_type": self.severity,
            "message": self.message,
            "details": {
                "metric": self.metric,
                "field": self.field,
                "subject": self.subject,
                "value": self.value,
                "threshold": self.threshold,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub metric: String,
    pub field: String,
    pub subject: Option<String>,
}

/// Whether an alert condition that stays exceeded is re-emitted every tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    #[default]
    EveryTick,
    OnChange,
}

fn count_alert(
    alerts: &mut Vec<Alert>,
    severity: AlertSeverity,
    label: &str,
    field: &str,
    value: Option<f64>,
    threshold: f64,
) {
    let Some(value) = value else { return };
    if value >= threshold {
        alerts.push(Alert {
            severity,
            message: format!(
                "{} ({}) exceeds threshold ({})",
                label, value as i64, threshold as i64
            ),
            metric: "SessionOverview".to_string(),
            field: field.to_string(),
            subject: None,
            value,
            threshold,
        });
    }
}

/// Evaluate a bundle and generate alerts
pub fn check_alerts(bundle: &Bundle, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    // Session alerts
    if let Some(overview) = bundle.get("SessionOverview") {
        count_alert(
            &mut alerts,
            AlertSeverity::Warning,
            "Total sessions",
            "total_sessions",
            overview.get_f64("total_sessions"),
            thresholds.max_sessions,
        );
        count_alert(
            &mut alerts,
            AlertSeverity::Warning,
            "Active sessions",
            "active_sessions",
            overview.get_f64("active_sessions"),
            thresholds.max_active_sessions,
        );
        count_alert(
            &mut alerts,
            AlertSeverity::Critical,
            "Blocked sessions",
            "blocked_sessions",
            overview.get_f64("blocked_sessions"),
            thresholds.max_blocked_sessions,
        );
    }

    // Tablespace alerts
    if let Some(tablespaces) = bundle.get("TablespaceUsage").and_then(|d| d.list("tablespaces")) {
        for ts in tablespaces {
            let Some(pct) = ts.get("pct_used").and_then(Value::as_f64) else {
                continue;
            };
            if pct < thresholds.max_tablespace_pct {
                continue;
            }
            let name = ts
                .get("tablespace")
                .and_then(Value::as_str)
                .unwrap_or("N/A")
                .to_string();
            let severity = if pct >= thresholds.max_tablespace_pct + TABLESPACE_CRITICAL_MARGIN {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            alerts.push(Alert {
                severity,
                message: format!("Tablespace {} at {:.1}% full", name, pct),
                metric: "TablespaceUsage".to_string(),
                field: "pct_used".to_string(),
                subject: Some(name),
                value: pct,
                threshold: thresholds.max_tablespace_pct,
            });
        }
    }

    alerts
}

/// Applies an [`AlertPolicy`] across consecutive ticks
#[derive(Debug, Default)]
pub struct AlertTracker {
    policy: AlertPolicy,
    active: HashSet<AlertKey>,
}

impl AlertTracker {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            active: HashSet::new(),
        }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Filter this tick's alerts down to the ones to emit.
    ///
    /// With `OnChange`, a condition already active on the previous tick is
    /// suppressed; a condition that clears is re-armed.
    pub fn apply(&mut self, alerts: Vec<Alert>) -> Vec<Alert> {
        let current: HashSet<AlertKey> = alerts.iter().map(Alert::key).collect();
        let emitted = match self.policy {
            AlertPolicy::EveryTick => alerts,
            AlertPolicy::OnChange => alerts
                .into_iter()
                .filter(|a| !self.active.contains(&a.key()))
                .collect(),
        };
        self.active = current;
        emitted
    }

    pub fn reset(&mut self) {
        self.active.clear();
    }
}

/// Append alerts to the alert log and mirror them to the process log
pub fn record_alerts(sink: &dyn LogSink, alerts: &[Alert]) -> Result<()> {
    for alert in alerts {
        log::warn!("{}: {}", alert.severity, alert.message);
        sink.append(&serde_json::to_string(&alert.log_record())?)?;
    }
    Ok(())
}
