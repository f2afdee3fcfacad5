//! Offline aggregation of the TopSessions data log.
//!
//! Each logged sample lists the sessions seen at that tick. Entries are
//! folded per `(sid, sql_id)` and can then be ranked, or grouped by one
//! attribute to spot swarms of short jobs.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::core::monitor::metrics::TopSession;
use crate::core::monitor::LogRecord;
use crate::error::{OramonError, Result};

/// Metric whose log is analyzed
pub const SESSION_METRIC: &str = "TopSessions";

/// One `(sid, sql_id)` pair summed over every sample it appeared in
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub sid: i64,
    pub sql_id: String,
    pub cpu_seconds: f64,
    pub logical_reads_mb: f64,
    pub samples: usize,
    pub username: String,
    pub program: String,
    pub module: String,
}

/// Attribute sessions can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    User,
    Program,
    Sql,
    UserProgram,
    Module,
}

impl GroupBy {
    pub const ALL: [GroupBy; 5] = [
        GroupBy::User,
        GroupBy::Program,
        GroupBy::Sql,
        GroupBy::UserProgram,
        GroupBy::Module,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::User => "user",
            GroupBy::Program => "program",
            GroupBy::Sql => "sql",
            GroupBy::UserProgram => "user_program",
            GroupBy::Module => "module",
        }
    }

    fn key_of(&self, stats: &SessionStats) -> String {
        match self {
            GroupBy::User => stats.username.clone(),
            GroupBy::Program => stats.program.clone(),
            GroupBy::Sql => stats.sql_id.clone(),
            GroupBy::UserProgram => format!("{} | {}", stats.username, stats.program),
            GroupBy::Module => stats.module.clone(),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = OramonError;

    fn from_str(s: &str) -> Result<Self> {
        GroupBy::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OramonError::config(format!("Unknown grouping: {}", s)))
    }
}

/// Totals of one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionGroup {
    pub key: String,
    /// Session samples folded into the group
    pub samples: usize,
    /// Distinct `(sid, sql_id)` pairs
    pub sessions: usize,
    pub cpu_seconds: f64,
    pub logical_reads_mb: f64,
    pub sample_sql_id: String,
}

/// Aggregated TopSessions log
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    sessions: Vec<SessionStats>,
    index: HashMap<(i64, String), usize>,
    records: usize,
    skipped_lines: usize,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSONL data log. Lines that are not TopSessions records are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut log = SessionLog::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LogRecord>(line) {
                Ok(record) => {
                    if !log.add_record(&record) {
                        log.skipped_lines += 1;
                    }
                }
                Err(e) => {
                    log::debug!("Skipping unreadable line in {}: {}", path.display(), e);
                    log.skipped_lines += 1;
                }
            }
        }
        Ok(log)
    }

    /// Fold one logged sample in. Returns false when the record holds no sessions.
    pub fn add_record(&mut self, record: &LogRecord) -> bool {
        if record.metric != SESSION_METRIC {
            return false;
        }
        let Some(list) = record.data.get("sessions") else {
            return false;
        };
        let sessions: Vec<TopSession> = match serde_json::from_value(list.clone()) {
            Ok(sessions) => sessions,
            Err(e) => {
                log::debug!("Sample {} has malformed sessions: {}", record.sample_id, e);
                return false;
            }
        };
        for session in &sessions {
            self.add_session(session);
        }
        self.records += 1;
        true
    }

    fn add_session(&mut self, session: &TopSession) {
        let key = (session.sid, session.sql_id.clone());
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.sessions.push(SessionStats {
                    sid: session.sid,
                    sql_id: session.sql_id.clone(),
                    ..Default::default()
                });
                self.index.insert(key, self.sessions.len() - 1);
                self.sessions.len() - 1
            }
        };
        let stats = &mut self.sessions[slot];
        stats.cpu_seconds += session.cpu_seconds;
        stats.logical_reads_mb += session.logical_reads_mb;
        stats.samples += 1;
        // latest sample wins for descriptive fields
        stats.username = session.username.clone();
        stats.program = session.program.clone();
        stats.module = session.module.clone();
    }

    /// Aggregated pairs in first-seen order
    pub fn sessions(&self) -> &[SessionStats] {
        &self.sessions
    }

    /// Samples that contributed sessions
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn top_by_cpu(&self, n: usize) -> Vec<&SessionStats> {
        self.top_by(n, |s| s.cpu_seconds)
    }

    pub fn top_by_reads(&self, n: usize) -> Vec<&SessionStats> {
        self.top_by(n, |s| s.logical_reads_mb)
    }

    fn top_by(&self, n: usize, value: impl Fn(&SessionStats) -> f64) -> Vec<&SessionStats> {
        let mut ranked: Vec<&SessionStats> = self.sessions.iter().collect();
        ranked.sort_by(|a, b| value(b).total_cmp(&value(a)));
        ranked.truncate(n);
        ranked
    }

    /// Groups ordered by sample count, then CPU
    pub fn group_by(&self, by: GroupBy, n: usize) -> Vec<SessionGroup> {
        let mut groups: Vec<SessionGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for stats in &self.sessions {
            let key = by.key_of(stats);
            let slot = match index.get(&key) {
                Some(&i) => i,
                None => {
                    groups.push(SessionGroup {
                        key: key.clone(),
                        samples: 0,
                        sessions: 0,
                        cpu_seconds: 0.0,
                        logical_reads_mb: 0.0,
                        sample_sql_id: stats.sql_id.clone(),
                    });
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let group = &mut groups[slot];
            group.samples += stats.samples;
            group.sessions += 1;
            group.cpu_seconds += stats.cpu_seconds;
            group.logical_reads_mb += stats.logical_reads_mb;
        }
        groups.sort_by(|a, b| {
            b.samples
                .cmp(&a.samples)
                .then_with(|| b.cpu_seconds.total_cmp(&a.cpu_seconds))
        });
        groups.truncate(n);
        groups
    }
}
