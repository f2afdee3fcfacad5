//! Append-only log sinks.
//!
//! Every metric unit writes to its own sink, one JSON record per line. Sinks
//! are created by a [`SinkFactory`] handed to the registry builder, so the
//! destination (files, memory) is decided by the caller and not by global
//! logger state.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::metric::MetricData;
use crate::error::{OramonError, Result};

/// One line in a metric's data log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub metric: String,
    pub sample_id: String,
    pub data: MetricData,
}

/// Single-destination, line-oriented append-only writer
pub trait LogSink: Send {
    /// Append one complete line. `line` must not contain a newline.
    fn append(&self, line: &str) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Where the lines end up (file path or a descriptive label)
    fn location(&self) -> String;
}

/// Creates one sink per named stream
pub trait SinkFactory {
    fn open(&self, stream: &str) -> Result<Box<dyn LogSink>>;
}

fn check_single_line(line: &str) -> Result<()> {
    if line.contains('\n') {
        return Err(OramonError::other("log lines must not contain newlines"));
    }
    Ok(())
}

/// JSONL file sink opened in append mode
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonlSink {
    fn append(&self, line: &str) -> Result<()> {
        check_single_line(line)?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        // One write per record so lines never interleave
        let mut file = self.file.lock();
        file.write_all(buf.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Opens `<dir>/<stream lowercased>.jsonl`
#[derive(Debug, Clone)]
pub struct JsonlSinkFactory {
    dir: PathBuf,
}

impl JsonlSinkFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", stream.to_lowercase()))
    }
}

impl SinkFactory for JsonlSinkFactory {
    fn open(&self, stream: &str) -> Result<Box<dyn LogSink>> {
        Ok(Box::new(JsonlSink::open(self.path_for(stream))?))
    }
}

type SharedLines = Arc<Mutex<Vec<String>>>;

/// In-memory sink, mostly for embedding and tests
pub struct MemorySink {
    name: String,
    lines: SharedLines,
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) -> Result<()> {
        check_single_line(line)?;
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        format!("memory:{}", self.name)
    }
}

/// Hands out [`MemorySink`]s and keeps their lines readable by stream name
#[derive(Clone, Default)]
pub struct MemorySinkFactory {
    streams: Arc<Mutex<HashMap<String, SharedLines>>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far to `stream`
    pub fn lines(&self, stream: &str) -> Vec<String> {
        self.streams
            .lock()
            .get(&stream.to_lowercase())
            .map(|lines| lines.lock().clone())
            .unwrap_or_default()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open(&self, stream: &str) -> Result<Box<dyn LogSink>> {
        let name = stream.to_lowercase();
        let lines = self
            .streams
            .lock()
            .entry(name.clone())
            .or_default()
            .clone();
        Ok(Box::new(MemorySink { name, lines }))
    }
}

/// Read every record of a JSONL file, skipping blank lines
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_lines() {
        let factory = MemorySinkFactory::new();
        let sink = factory.open("WaitEvents").unwrap();
        sink.append("{\"a\":1}").unwrap();
        assert_eq!(factory.lines("waitevents"), vec!["{\"a\":1}".to_string()]);
        assert_eq!(sink.location(), "memory:waitevents");
    }

    #[test]
    fn test_multiline_rejected() {
        let factory = MemorySinkFactory::new();
        let sink = factory.open("x").unwrap();
        assert!(sink.append("a\nb").is_err());
        assert!(factory.lines("x").is_empty());
    }

    #[test]
    fn test_file_name_is_lowercased() {
        let factory = JsonlSinkFactory::new("logs");
        assert_eq!(
            factory.path_for("SessionOverview"),
            PathBuf::from("logs").join("sessionoverview.jsonl")
        );
    }
}
