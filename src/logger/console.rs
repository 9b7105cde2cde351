//! Line-oriented console sink: `LEVEL: message`, filtered by verbosity.

#![allow(missing_docs)]

use std::io::Write;

use colored::{ColoredString, Colorize};

use crate::logger::{Level, ReportSink, ScanEvent};

/// Writes one line per event at or below `threshold`.
pub struct ConsoleSink<W: Write> {
    out: W,
    threshold: Level,
    color: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, threshold: Level, color: bool) -> Self {
        Self {
            out,
            threshold,
            color,
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn tag(&self, level: Level) -> ColoredString {
        let label = level.as_str();
        if !self.color {
            return label.normal();
        }
        match level {
            Level::Severe => label.red().bold(),
            Level::Warning => label.yellow().bold(),
            Level::Info => label.green(),
            Level::Fine | Level::Finest => label.dimmed(),
        }
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn emit(&mut self, event: &ScanEvent) {
        let level = event.level();
        if level > self.threshold {
            return;
        }
        let tag = self.tag(level);
        // Console write failures are not the scan's concern.
        let _ = writeln!(self.out, "{tag}: {}", event.message());
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl<W: Write> std::fmt::Debug for ConsoleSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("threshold", &self.threshold)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}
