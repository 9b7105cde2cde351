//! VCI-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, VciError>;

/// Top-level error type for the class verifier.
///
/// Content-level findings (corrupt artifacts) are never errors; they travel as
/// [`LoadOutcome`](crate::loader::outcome::LoadOutcome) values. Everything in
/// this enum aborts the scan.
#[derive(Debug, Error)]
pub enum VciError {
    #[error("[VCI-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[VCI-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[VCI-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[VCI-2001] root does not exist: {path}")]
    RootNotFound { path: PathBuf },

    #[error("[VCI-2002] root is not a directory: {path}")]
    RootNotDirectory { path: PathBuf },

    #[error("[VCI-2003] path is not valid UTF-8: {path}")]
    NonUtf8Path { path: PathBuf },

    #[error("[VCI-2005] path {path} is not inside root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("[VCI-2004] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[VCI-3001] load infrastructure failure for {name}: {details}")]
    LoadInfrastructure { name: String, details: String },

    #[error("[VCI-3901] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

/// Coarse grouping used to report infrastructure failures distinctly from
/// configuration mistakes and filesystem problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Filesystem,
    LoadInfrastructure,
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Filesystem => "filesystem",
            Self::LoadInfrastructure => "load_infrastructure",
            Self::Internal => "internal",
        }
    }
}

impl VciError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "VCI-1001",
            Self::MissingConfig { .. } => "VCI-1002",
            Self::ConfigParse { .. } => "VCI-1003",
            Self::RootNotFound { .. } => "VCI-2001",
            Self::RootNotDirectory { .. } => "VCI-2002",
            Self::NonUtf8Path { .. } => "VCI-2003",
            Self::Io { .. } => "VCI-2004",
            Self::OutsideRoot { .. } => "VCI-2005",
            Self::LoadInfrastructure { .. } => "VCI-3001",
            Self::Serialization { .. } => "VCI-3901",
        }
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. } | Self::MissingConfig { .. } | Self::ConfigParse { .. } => {
                ErrorCategory::Config
            }
            Self::RootNotFound { .. }
            | Self::RootNotDirectory { .. }
            | Self::NonUtf8Path { .. }
            | Self::OutsideRoot { .. }
            | Self::Io { .. } => ErrorCategory::Filesystem,
            Self::LoadInfrastructure { .. } => ErrorCategory::LoadInfrastructure,
            Self::Serialization { .. } => ErrorCategory::Internal,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for linkage-level failures of one class.
    #[must_use]
    pub fn load_infrastructure(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::LoadInfrastructure {
            name: name.into(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for VciError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for VciError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
