//! Scan coordinator: drives discovery and isolated loading across roots, then
//! folds the corrupt names into one sorted failure list.
//!
//! Event order for a successful scan:
//!
//! ```text
//! ScanStarted → (per root: diagnostics) → Broken* (sorted) → ScanFinished
//! ```
//!
//! Any error emits a single `Fatal` event and no `Broken` events.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::core::paths::resolve_root;
use crate::loader::context::{ClassPathProvider, ContextProvider};
use crate::loader::isolated::{IsolatedLoader, LoadResult};
use crate::loader::outcome::LoadOutcome;
use crate::logger::{Level, ReportSink, ScanEvent};
use crate::scanner::walker::{ArtifactDiscoverer, DiscoveryConfig};

/// Per-candidate outcome counts. A name corrupt in two roots counts twice here
/// and once in [`ScanReport::broken`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub roots: usize,
    pub candidates: usize,
    pub loaded: usize,
    pub corrupt: usize,
    pub unresolved: usize,
}

impl ScanStats {
    fn record(&mut self, outcome: &LoadOutcome) {
        self.candidates += 1;
        match outcome {
            LoadOutcome::Loaded => self.loaded += 1,
            LoadOutcome::Corrupt { .. } => self.corrupt += 1,
            LoadOutcome::UnresolvedReference { .. } => self.unresolved += 1,
        }
    }
}

/// Result of a completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Roots as supplied by the caller.
    pub roots: Vec<PathBuf>,
    /// Unique corrupt logical names, sorted.
    pub broken: Vec<String>,
    pub stats: ScanStats,
}

impl ScanReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.broken.is_empty()
    }
}

/// Sequential scan over one or more roots.
#[derive(Debug)]
pub struct ScanCoordinator<P> {
    discoverer: ArtifactDiscoverer,
    loader: IsolatedLoader<P>,
}

impl<P: ContextProvider> ScanCoordinator<P> {
    pub fn new(discoverer: ArtifactDiscoverer, provider: P) -> Self {
        let loader = IsolatedLoader::new(provider, discoverer.config().extension.clone());
        Self { discoverer, loader }
    }

    /// Scan `roots` in order, reporting through `sink`.
    ///
    /// On error the sink receives one `Fatal` event and nothing from the
    /// partial scan beyond the diagnostics already emitted.
    pub fn scan(&self, roots: &[PathBuf], sink: &mut dyn ReportSink) -> Result<ScanReport> {
        let result = self.run(roots, sink);
        if let Err(err) = &result {
            sink.emit(&ScanEvent::fatal(err));
        }
        sink.flush();
        result
    }

    fn run(&self, roots: &[PathBuf], sink: &mut dyn ReportSink) -> Result<ScanReport> {
        let resolved = roots
            .iter()
            .map(|root| resolve_root(root))
            .collect::<Result<Vec<_>>>()?;

        sink.emit(&ScanEvent::ScanStarted {
            roots: roots.to_vec(),
        });

        let mut failures = BTreeSet::new();
        let mut stats = ScanStats {
            roots: roots.len(),
            ..ScanStats::default()
        };

        for root in &resolved {
            sink.emit(&ScanEvent::diagnostic(
                Level::Fine,
                format!("Scanning dir {}", root.display()),
            ));
            let paths = self.discoverer.discover(root)?;
            let results = self.loader.load_root(root, &paths)?;
            for result in &results {
                stats.record(&result.outcome);
                report_outcome(result, sink);
                if result.outcome.is_corrupt() {
                    failures.insert(result.candidate.logical_name.clone());
                }
            }
        }

        let broken: Vec<String> = failures.into_iter().collect();
        for name in &broken {
            sink.emit(&ScanEvent::Broken { name: name.clone() });
        }
        sink.emit(&ScanEvent::ScanFinished { stats });

        Ok(ScanReport {
            roots: roots.to_vec(),
            broken,
            stats,
        })
    }
}

impl ScanCoordinator<ClassPathProvider> {
    /// Coordinator over class-file contexts, configured from `[scan]` and `[loader]`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ArtifactDiscoverer::new(DiscoveryConfig::from(&config.scan)),
            ClassPathProvider::from_config(config),
        )
    }
}

fn report_outcome(result: &LoadResult, sink: &mut dyn ReportSink) {
    let name = &result.candidate.logical_name;
    sink.emit(&ScanEvent::diagnostic(Level::Finest, format!("Loading {name}")));
    match &result.outcome {
        LoadOutcome::Loaded => {}
        LoadOutcome::Corrupt { reason } => {
            sink.emit(&ScanEvent::diagnostic(
                Level::Fine,
                format!("Can't load {name}: {reason}"),
            ));
        }
        LoadOutcome::UnresolvedReference { missing } => {
            sink.emit(&ScanEvent::diagnostic(
                Level::Fine,
                format!("Skipping {name}: {missing} is not in this root"),
            ));
        }
    }
}
