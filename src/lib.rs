#![forbid(unsafe_code)]

//! verify_classes (vci): batch integrity checker for compiled JVM class files.
//!
//! Every class file under a root is loaded through a loading context that
//! sees only that root. Each result is classified:
//! 1. **Loaded**: the class and its supertypes resolved
//! 2. **Corrupt**: the bytes are not a valid class file (reported)
//! 3. **Unresolved reference**: something it needs lives in another root
//!    (expected, suppressed)
//!
//! Corrupt names from all roots are deduplicated, sorted, and reported once.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use verify_classes::prelude::*;
//!
//! let config = Config::load(None)?;
//! let mut sink = RecordingSink::new();
//! let report = ScanCoordinator::from_config(&config)
//!     .scan(&[PathBuf::from("target/classes")], &mut sink)?;
//! for name in &report.broken {
//!     println!("broken: {name}");
//! }
//! # Ok::<(), VciError>(())
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use verify_classes::loader::classfile::ClassFile;
//! use verify_classes::scanner::walker::{ArtifactDiscoverer, DiscoveryConfig};
//! ```

pub mod prelude;

pub mod core;
pub mod loader;
pub mod logger;
pub mod scanner;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
