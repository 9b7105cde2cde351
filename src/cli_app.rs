//! Top-level CLI definition and dispatch.

use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::Parser;
use colored::control;
use serde_json::{Value, json};
use thiserror::Error;

use verify_classes::core::config::Config;
use verify_classes::core::errors::{ErrorCategory, VciError};
use verify_classes::core::paths::{directory_entries, split_search_path};
use verify_classes::logger::Level;
use verify_classes::logger::console::ConsoleSink;
use verify_classes::logger::jsonl::JsonlWriter;
use verify_classes::logger::tee::TeeSink;
use verify_classes::scanner::coordinator::{ScanCoordinator, ScanReport};

/// Verify that every compiled class under the given roots loads.
#[derive(Debug, Parser)]
#[command(
    name = "vci",
    author,
    version,
    about = "Verify Classes In - class-file integrity checker",
    long_about = None
)]
pub struct Cli {
    /// Root directories to scan, in order. Defaults to the directories on the
    /// class path.
    #[arg(value_name = "ROOT")]
    roots: Vec<PathBuf>,
    /// Search path used when no ROOT is given (platform path-list separator).
    #[arg(long, value_name = "PATHS")]
    class_path: Option<OsString>,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Show per-root progress and suppressed findings (log level fine).
    #[arg(short, long, conflicts_with_all = ["quiet", "log_level"])]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, conflicts_with_all = ["verbose", "log_level"])]
    quiet: bool,
    /// Log level: severe, warning, info, fine, finest.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<Level>,
    /// Also append every event to this JSONL file.
    #[arg(long, value_name = "PATH")]
    jsonl: Option<PathBuf>,
    /// Exit with status 4 when any broken artifact is found.
    #[arg(long)]
    fail_on_broken: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// The scan aborted; the sink already showed the error.
    #[error(transparent)]
    Scan(#[from] VciError),
    /// Broken artifacts found with `--fail-on-broken`.
    #[error("{0} broken artifact(s) found")]
    Broken(usize),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Scan(err) => match err.category() {
                ErrorCategory::Config => 1,
                ErrorCategory::Filesystem | ErrorCategory::LoadInfrastructure => 2,
                ErrorCategory::Internal => 3,
            },
            Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Broken(_) => 4,
        }
    }

    /// `true` when the error already went through the console sink.
    pub const fn already_reported(&self) -> bool {
        matches!(self, Self::Scan(_))
    }
}

/// Run one scan as described by `cli`.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))?;
    let roots = resolve_roots(
        &cli.roots,
        cli.class_path.as_deref(),
        &config.scan.search_path,
        env::var_os("CLASSPATH").as_deref(),
    );
    let threshold = verbosity(cli, &config);
    let color = !cli.no_color && io::stderr().is_terminal();
    let mut sink = TeeSink::new().with(ConsoleSink::new(io::stderr(), threshold, color));
    if let Some(path) = cli.jsonl.clone().or_else(|| config.report.jsonl_log.clone()) {
        sink.push(Box::new(JsonlWriter::open(path, threshold)));
    }

    let report = ScanCoordinator::from_config(&config).scan(&roots, &mut sink)?;

    if output_mode(cli) == OutputMode::Json {
        write_json_line(&report_json(&report))?;
    }

    if (cli.fail_on_broken || config.report.fail_on_broken) && !report.is_clean() {
        return Err(CliError::Broken(report.broken.len()));
    }
    Ok(())
}

/// Explicit roots win; otherwise the first non-empty search path among
/// `--class-path`, `scan.search_path`, and `CLASSPATH`, reduced to the
/// directories that exist. The result may be empty; scanning nothing is a
/// clean run.
fn resolve_roots(
    explicit: &[PathBuf],
    class_path: Option<&OsStr>,
    configured: &[PathBuf],
    env_class_path: Option<&OsStr>,
) -> Vec<PathBuf> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    let entries = if let Some(raw) = class_path {
        split_search_path(raw)
    } else if !configured.is_empty() {
        configured.to_vec()
    } else if let Some(raw) = env_class_path {
        split_search_path(raw)
    } else {
        Vec::new()
    };
    directory_entries(&entries)
}

fn verbosity(cli: &Cli, config: &Config) -> Level {
    if let Some(level) = cli.log_level {
        level
    } else if cli.verbose {
        Level::Fine
    } else if cli.quiet {
        Level::Severe
    } else {
        config.report.log_level
    }
}

fn report_json(report: &ScanReport) -> Value {
    json!({
        "command": "scan",
        "roots": report.roots,
        "broken": report.broken,
        "broken_count": report.broken.len(),
        "stats": report.stats,
    })
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = env::var("VCI_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
