//! Logging infrastructure for s6dash.
//!
//! The dashboard owns the terminal while it runs, so diagnostics go to a
//! JSON-lines file instead of the screen. A stderr layer is available for
//! non-interactive use.
//!
//! ## Features
//!
//! - JSON lines file output to `~/.s6dash/logs/s6dash.log` (rotated daily)
//! - Optional compact console output on stderr
//! - `-v` flag support for debug logging, `RUST_LOG` overrides
//!
//! ## Example
//!
//! ```no_run
//! use s6dash_core::logging;
//!
//! let _guard = logging::init_logging(None, false, false).expect("logging init");
//!
//! tracing::info!("s6dash started");
//! tracing::debug!(service = "nginx", "polling");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{DashError, Result};

/// File name of the dashboard's own log.
pub const LOG_FILE_NAME: &str = "s6dash.log";

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the s6dash logging system.
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.s6dash/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
/// * `console` - Also log to stderr. Leave off while the TUI is on screen.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool, console: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| DashError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("s6dash={default_level}")));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_file(verbose)
            .with_line_number(verbose)
            .compact()
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), verbose, console, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for testing.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Base directory for s6dash state: `~/.s6dash/`.
pub fn home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| DashError::Internal {
        message: "home directory could not be determined".into(),
    })?;

    Ok(home.join(".s6dash"))
}

/// Get the default log directory path.
///
/// Returns `~/.s6dash/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join("logs"))
}
