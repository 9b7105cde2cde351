//! JSONL sink: append-only line-delimited JSON for machine consumption.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory and
//! written with a single `write_all` so a concurrent `tail -f` never sees a
//! partial line.
//!
//! Three-level fallback chain:
//! 1. Configured file path
//! 2. stderr with `[VCI-JSONL]` prefix
//! 3. Silent discard (logging failures never abort a scan)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, VciError};
use crate::logger::{Level, ReportSink, ScanEvent};

/// Event type identifiers written to the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScanStarted,
    Diagnostic,
    Broken,
    ScanFinished,
    Fatal,
}

/// A single JSONL log entry. All fields are optional except `ts`, `event`, `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub level: Level,
    /// Roots being scanned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<Vec<String>>,
    /// Failing logical name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrupt: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<usize>,
    /// VCI error code if the scan aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, level: Level) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            level,
            roots: None,
            name: None,
            candidates: None,
            loaded: None,
            corrupt: None,
            unresolved: None,
            error_code: None,
            category: None,
            message: None,
        }
    }

    /// Flatten a scan event into the wire shape.
    pub fn from_event(event: &ScanEvent) -> Self {
        match event {
            ScanEvent::ScanStarted { roots } => {
                let mut entry = Self::new(EventType::ScanStarted, event.level());
                entry.roots = Some(roots.iter().map(|r| r.display().to_string()).collect());
                entry
            }
            ScanEvent::Diagnostic { level, message } => {
                let mut entry = Self::new(EventType::Diagnostic, *level);
                entry.message = Some(message.clone());
                entry
            }
            ScanEvent::Broken { name } => {
                let mut entry = Self::new(EventType::Broken, event.level());
                entry.name = Some(name.clone());
                entry
            }
            ScanEvent::ScanFinished { stats } => {
                let mut entry = Self::new(EventType::ScanFinished, event.level());
                entry.candidates = Some(stats.candidates);
                entry.loaded = Some(stats.loaded);
                entry.corrupt = Some(stats.corrupt);
                entry.unresolved = Some(stats.unresolved);
                entry
            }
            ScanEvent::Fatal {
                code,
                category,
                message,
            } => {
                let mut entry = Self::new(EventType::Fatal, event.level());
                entry.error_code = Some((*code).to_string());
                entry.category = Some(category.label().to_string());
                entry.message = Some(message.clone());
                entry
            }
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL event writer with graceful degradation.
pub struct JsonlWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    threshold: Level,
}

impl JsonlWriter {
    /// Open the JSONL log file. Falls back to stderr on failure.
    pub fn open(path: impl Into<PathBuf>, threshold: Level) -> Self {
        let path = path.into();
        let mut w = Self {
            path,
            writer: None,
            state: WriterState::Discard,
            threshold,
        };
        match open_append(&w.path) {
            Ok(file) => {
                w.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                w.state = WriterState::Normal;
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[VCI-JSONL] {e}; using stderr");
                w.state = WriterState::Stderr;
            }
        }
        w
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[VCI-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                let written = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if !written {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[VCI-JSONL] {line}").is_err() {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Normal => {
                let _ = writeln!(
                    io::stderr(),
                    "[VCI-JSONL] write to {} failed, using stderr",
                    self.path.display()
                );
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }
}

impl ReportSink for JsonlWriter {
    fn emit(&mut self, event: &ScanEvent) {
        if event.level() > self.threshold {
            return;
        }
        self.write_entry(&LogEntry::from_event(event));
    }

    fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }
}

impl std::fmt::Debug for JsonlWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlWriter")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// Open or create a file for appending, creating parent directories.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| VciError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| VciError::io(path, source))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
