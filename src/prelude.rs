//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use verify_classes::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{ErrorCategory, Result, VciError};

// Loader
pub use crate::loader::classfile::{ClassFile, FormatError};
pub use crate::loader::context::{
    ClassPathContext, ClassPathProvider, ContextProvider, LoadingContext,
};
pub use crate::loader::isolated::{IsolatedLoader, LoadResult};
pub use crate::loader::outcome::LoadOutcome;

// Scanner
pub use crate::scanner::candidate::Candidate;
pub use crate::scanner::coordinator::{ScanCoordinator, ScanReport, ScanStats};
pub use crate::scanner::walker::{ArtifactDiscoverer, DiscoveryConfig};

// Reporting
pub use crate::logger::jsonl::JsonlWriter;
pub use crate::logger::tee::TeeSink;
pub use crate::logger::{Level, RecordingSink, ReportSink, ScanEvent};
