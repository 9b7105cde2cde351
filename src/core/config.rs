//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, VciError};
use crate::core::paths::split_search_path;
use crate::logger::Level;

/// Oldest class-file major version the JVM ever produced (JDK 1.0.2).
pub const MIN_MAJOR_VERSION: u16 = 45;

/// Full verifier configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub loader: LoaderConfig,
    pub report: ReportConfig,
    /// Path the configuration was loaded from (or would have been).
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Discovery behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Artifact file extension, without the leading dot.
    pub extension: String,
    /// Follow symlinked directories (with cycle detection) instead of skipping them.
    pub follow_symlinks: bool,
    /// Search-path-like list of locations used when no roots are given.
    pub search_path: Vec<PathBuf>,
}

/// Class-file loading context knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Newest class-file major version accepted as well-formed.
    pub max_major_version: u16,
    /// Binary-name prefixes resolved by the platform rather than the root.
    pub platform_packages: Vec<String>,
}

/// Reporting and verbosity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    pub log_level: Level,
    /// Optional JSONL event log.
    pub jsonl_log: Option<PathBuf>,
    /// Exit non-zero when broken artifacts are reported.
    pub fail_on_broken: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extension: "class".to_string(),
            follow_symlinks: false,
            search_path: Vec::new(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            // Java 25.
            max_major_version: 69,
            platform_packages: ["java.", "javax.", "jdk.", "sun.", "com.sun."]
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            log_level: Level::Info,
            jsonl_log: None,
            fail_on_broken: false,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[VCI-CONFIG] WARNING: HOME not set, falling back to /tmp for config path");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("vci").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| VciError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(VciError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("VCI_SCAN_EXTENSION") {
            self.scan.extension = raw;
        }
        if let Some(raw) = lookup("VCI_SCAN_FOLLOW_SYMLINKS") {
            self.scan.follow_symlinks = parse_env_bool("VCI_SCAN_FOLLOW_SYMLINKS", &raw)?;
        }
        if let Some(raw) = lookup("VCI_SCAN_SEARCH_PATH") {
            self.scan.search_path = split_search_path(OsStr::new(&raw));
        }
        if let Some(raw) = lookup("VCI_LOADER_MAX_MAJOR_VERSION") {
            self.loader.max_major_version = parse_env_u16("VCI_LOADER_MAX_MAJOR_VERSION", &raw)?;
        }
        if let Some(raw) = lookup("VCI_LOADER_PLATFORM_PACKAGES") {
            self.loader.platform_packages = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("VCI_REPORT_LOG_LEVEL") {
            self.report.log_level = raw.parse().map_err(|details| VciError::ConfigParse {
                context: "env",
                details: format!("VCI_REPORT_LOG_LEVEL={raw:?}: {details}"),
            })?;
        }
        if let Some(raw) = lookup("VCI_REPORT_JSONL_LOG") {
            self.report.jsonl_log = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("VCI_REPORT_FAIL_ON_BROKEN") {
            self.report.fail_on_broken = parse_env_bool("VCI_REPORT_FAIL_ON_BROKEN", &raw)?;
        }
        Ok(())
    }

    /// Normalize user-supplied values for consistent comparison.
    fn normalize(&mut self) {
        let trimmed = self.scan.extension.trim().trim_start_matches('.');
        self.scan.extension = trimmed.to_string();

        // Trailing slashes on search path entries would survive into root names.
        for path in &mut self.scan.search_path {
            let s = path.to_string_lossy();
            if s.len() > 1
                && let Some(stripped) = s.strip_suffix('/')
            {
                *path = PathBuf::from(stripped);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scan.extension.is_empty() {
            return Err(VciError::InvalidConfig {
                details: "scan.extension must not be empty".to_string(),
            });
        }
        if self.scan.extension.contains(['/', '\\', '.']) {
            return Err(VciError::InvalidConfig {
                details: format!(
                    "scan.extension must be a single extension without separators, got {:?}",
                    self.scan.extension
                ),
            });
        }

        if self.loader.max_major_version < MIN_MAJOR_VERSION {
            return Err(VciError::InvalidConfig {
                details: format!(
                    "loader.max_major_version must be >= {MIN_MAJOR_VERSION}, got {}",
                    self.loader.max_major_version
                ),
            });
        }

        for prefix in &self.loader.platform_packages {
            if prefix.trim().is_empty() {
                return Err(VciError::InvalidConfig {
                    details: "loader.platform_packages entries must not be empty".to_string(),
                });
            }
            if prefix.contains('/') {
                return Err(VciError::InvalidConfig {
                    details: format!(
                        "loader.platform_packages uses dotted names, got {prefix:?}"
                    ),
                });
            }
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u16(name: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .map_err(|error| VciError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| VciError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
