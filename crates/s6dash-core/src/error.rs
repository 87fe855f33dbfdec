//! Error types for s6dash operations.
//!
//! [`DashError`] covers every failure the dashboard can meet. Only discovery
//! and terminal failures end the program; everything a running dashboard hits
//! (a status probe, a control command, a log file) is turned into data for the
//! view or a log line by the caller.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias using [`DashError`].
pub type Result<T> = std::result::Result<T, DashError>;

/// Error type for all s6dash operations.
#[derive(Debug, Error)]
pub enum DashError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file given explicitly but missing
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Discovery Errors
    // =========================================================================
    /// The supervision root could not be read
    #[error("Cannot read supervision directory {path}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Supervisor Errors
    // =========================================================================
    /// A supervisor tool could not be started
    #[error("Failed to run {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A supervisor tool exited unsuccessfully
    #[error("{program} failed for {service} ({status}): {output}")]
    CommandFailed {
        program: String,
        service: String,
        status: ExitStatus,
        output: String,
    },

    /// s6-svstat printed something we cannot read
    #[error("Unexpected s6-svstat output for {service}: {message}")]
    StatusParse { service: String, message: String },

    // =========================================================================
    // Log Errors
    // =========================================================================
    /// No log file found for a service
    #[error("No log file found for {service} (tried {})", display_paths(.tried))]
    LogNotFound { service: String, tried: Vec<PathBuf> },

    /// Reading a followed log failed
    #[error("Failed to read log {path}")]
    LogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // TUI Errors
    // =========================================================================
    /// Terminal initialization failed
    #[error("Terminal initialization failed: {message}")]
    TerminalInit { message: String },

    /// Terminal restore failed
    #[error("Failed to restore terminal: {message}")]
    TerminalRestore { message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in s6dash)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl DashError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a status parse error
    pub fn status_parse(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StatusParse {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if this error should end the application
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Discovery { .. } | Self::TerminalInit { .. } | Self::Internal { .. }
        )
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. } | Self::ConfigValidation { .. }
        )
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => Some("Check the --config path or remove the flag to use defaults"),
            Self::ConfigInvalid { .. } => Some("Check YAML syntax in ~/.s6dash/config.yaml"),
            Self::Discovery { .. } => Some("Pass the s6 scan directory, e.g. /run/service"),
            Self::CommandSpawn { .. } => Some("Make sure the s6 tools are installed and on PATH"),
            Self::LogNotFound { .. } => Some("Set log.search in ~/.s6dash/config.yaml to match your logdirs"),
            Self::TerminalInit { .. } => Some("Try running in a different terminal"),
            _ => None,
        }
    }
}
