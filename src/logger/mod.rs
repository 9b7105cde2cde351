//! Structured scan events and the sinks that consume them.
//!
//! The scan core never prints. It emits [`ScanEvent`]s into a [`ReportSink`];
//! sinks decide formatting, destination, and verbosity filtering. A sink must
//! never fail the scan, so [`ReportSink::emit`] returns nothing.

#![allow(missing_docs)]

#[cfg(feature = "cli")]
pub mod console;
pub mod jsonl;
pub mod tee;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ErrorCategory, VciError};
use crate::scanner::coordinator::ScanStats;

/// Verbosity level, ordered from least to most chatty.
///
/// An event is shown by a filtering sink when `event.level() <= threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Severe,
    Warning,
    Info,
    Fine,
    Finest,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Severe => "SEVERE",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Fine => "FINE",
            Self::Finest => "FINEST",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "severe" | "error" => Ok(Self::Severe),
            "warning" | "warn" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "fine" | "debug" => Ok(Self::Fine),
            "finest" | "trace" | "all" => Ok(Self::Finest),
            other => Err(format!(
                "unknown log level {other:?} (expected severe, warning, info, fine, finest)"
            )),
        }
    }
}

/// One observable step of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// Emitted once, before the first root is walked.
    ScanStarted { roots: Vec<PathBuf> },
    /// Fine-grained progress and suppressed findings.
    Diagnostic { level: Level, message: String },
    /// One failing logical name; emitted once per name, in sorted order.
    Broken { name: String },
    /// Emitted once after every root completed.
    ScanFinished { stats: ScanStats },
    /// The scan aborted.
    Fatal {
        code: &'static str,
        category: ErrorCategory,
        message: String,
    },
}

impl ScanEvent {
    #[must_use]
    pub fn diagnostic(level: Level, message: impl Into<String>) -> Self {
        Self::Diagnostic {
            level,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn fatal(error: &VciError) -> Self {
        Self::Fatal {
            code: error.code(),
            category: error.category(),
            message: error.to_string(),
        }
    }

    #[must_use]
    pub const fn level(&self) -> Level {
        match self {
            Self::ScanStarted { .. } | Self::Broken { .. } => Level::Info,
            Self::Diagnostic { level, .. } => *level,
            Self::ScanFinished { .. } => Level::Fine,
            Self::Fatal { .. } => Level::Severe,
        }
    }

    /// Human-readable single-line rendering.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ScanStarted { roots } => {
                let listed: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
                format!("Scanning [{}]", listed.join(", "))
            }
            Self::Diagnostic { message, .. } | Self::Fatal { message, .. } => message.clone(),
            Self::Broken { name } => format!("Broken {name}"),
            Self::ScanFinished { stats } => format!(
                "Scanned {} root(s), {} candidate(s): {} loaded, {} corrupt, {} unresolved",
                stats.roots, stats.candidates, stats.loaded, stats.corrupt, stats.unresolved
            ),
        }
    }
}

/// Destination for scan events.
pub trait ReportSink {
    fn emit(&mut self, event: &ScanEvent);

    /// Push buffered output to its destination.
    fn flush(&mut self) {}
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn emit(&mut self, event: &ScanEvent) {
        (**self).emit(event);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn emit(&mut self, event: &ScanEvent) {
        (**self).emit(event);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// In-memory sink keeping every event, for library callers and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Vec<ScanEvent>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[ScanEvent] {
        &self.events
    }

    /// Names carried by `Broken` events, in emission order.
    #[must_use]
    pub fn broken_names(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ScanEvent::Broken { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Events other than diagnostics.
    #[must_use]
    pub fn report_events(&self) -> Vec<&ScanEvent> {
        self.events
            .iter()
            .filter(|event| !matches!(event, ScanEvent::Diagnostic { .. }))
            .collect()
    }
}

impl ReportSink for RecordingSink {
    fn emit(&mut self, event: &ScanEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_verbosity() {
        assert!(Level::Severe < Level::Info);
        assert!(Level::Info < Level::Fine);
        assert!(Level::Fine < Level::Finest);
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("FINE".parse::<Level>(), Ok(Level::Fine));
        assert_eq!(" warning ".parse::<Level>(), Ok(Level::Warning));
        assert_eq!("trace".parse::<Level>(), Ok(Level::Finest));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn start_message_lists_roots() {
        let event = ScanEvent::ScanStarted {
            roots: vec![PathBuf::from("/out/a"), PathBuf::from("/out/b")],
        };
        assert_eq!(event.message(), "Scanning [/out/a, /out/b]");
        assert_eq!(event.level(), Level::Info);
    }

    #[test]
    fn fatal_event_carries_code_and_category() {
        let err = VciError::RootNotFound {
            path: PathBuf::from("/missing"),
        };
        let event = ScanEvent::fatal(&err);
        assert_eq!(event.level(), Level::Severe);
        match event {
            ScanEvent::Fatal { code, category, .. } => {
                assert_eq!(code, "VCI-2001");
                assert_eq!(category, ErrorCategory::Filesystem);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn recording_sink_filters_broken_names() {
        let mut sink = RecordingSink::new();
        sink.emit(&ScanEvent::ScanStarted { roots: Vec::new() });
        sink.emit(&ScanEvent::diagnostic(Level::Fine, "Scanning dir /x"));
        sink.emit(&ScanEvent::Broken {
            name: "a.Bar".to_string(),
        });
        assert_eq!(sink.broken_names(), vec!["a.Bar"]);
        assert_eq!(sink.report_events().len(), 2);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(ScanEvent::Broken {
            name: "a.Bar".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "broken");
        assert_eq!(json["name"], "a.Bar");
    }
}
