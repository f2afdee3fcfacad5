use std::collections::VecDeque;

use serde::Serialize;

use super::registry::Bundle;

const DEFAULT_HISTORY_SIZE: usize = 100;

/// Headline figures of one finished tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSummary {
    pub sample_id: String,
    /// Entries with data
    pub collected: usize,
    /// Entries that came back empty
    pub empty: usize,
    pub alerts: usize,
    pub rows_stored: usize,
    pub connection_lost: bool,
    pub total_sessions: Option<f64>,
    pub active_sessions: Option<f64>,
    pub blocked_sessions: Option<f64>,
}

impl TickSummary {
    pub fn from_bundle(sample_id: &str, bundle: &Bundle, alerts: usize, rows_stored: usize) -> Self {
        let overview = bundle.get("SessionOverview");
        let field = |name: &str| overview.and_then(|d| d.get_f64(name));
        Self {
            sample_id: sample_id.to_string(),
            collected: bundle.collected_count(),
            empty: bundle.len() - bundle.collected_count(),
            alerts,
            rows_stored,
            connection_lost: bundle.connection_lost(),
            total_sessions: field("total_sessions"),
            active_sessions: field("active_sessions"),
            blocked_sessions: field("blocked_sessions"),
        }
    }
}

/// Circular buffer of recent tick summaries
#[derive(Debug, Clone)]
pub struct TickHistory {
    capacity: usize,
    ticks: VecDeque<TickSummary>,
}

impl TickHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ticks: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, summary: TickSummary) {
        if self.ticks.len() >= self.capacity {
            self.ticks.pop_front();
        }
        self.ticks.push_back(summary);
    }

    pub fn latest(&self) -> Option<&TickSummary> {
        self.ticks.back()
    }

    /// The tick before the latest one
    pub fn previous(&self) -> Option<&TickSummary> {
        self.ticks.iter().rev().nth(1)
    }

    /// Change in total sessions between the last two ticks
    pub fn session_delta(&self) -> Option<f64> {
        let latest = self.latest()?.total_sessions?;
        let previous = self.previous()?.total_sessions?;
        Some(latest - previous)
    }

    /// Total sessions over the retained ticks, oldest first (missing as 0)
    pub fn sessions_series(&self) -> Vec<u64> {
        self.ticks
            .iter()
            .map(|t| t.total_sessions.unwrap_or(0.0).max(0.0) as u64)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TickSummary> {
        self.ticks.iter()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TickHistory {
    fn default() -> Self {
        Self::new()
    }
}
