//! Shared value types.
//!
//! Everything here is immutable once built: a [`ServiceRef`] lives for the
//! whole process, a [`StatusRecord`] is replaced wholesale by the next poll.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::signal::Signal;

/// A supervised service, identified by its service directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceRef {
    dir: PathBuf,
    name: String,
}

impl ServiceRef {
    /// Create a reference for a service directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        Self { dir, name }
    }

    /// The service directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Display name: the last path segment.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// State of one service as reported by `s6-svstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Process is running
    pub up: bool,
    /// Supervisor wants it running
    pub wanted_up: bool,
    /// Service signalled readiness
    pub ready: bool,
    /// Pid, -1 when down
    pub pid: i64,
    /// Last exit code, -1 when killed by a signal or never exited
    pub exit_code: i64,
    /// Terminating signal name, `NA` when none
    pub signal: String,
    /// Time spent in the current up/down state
    pub up_for: Duration,
    /// Time spent ready
    pub ready_for: Duration,
}

/// Outcome of one status query: the record, or the error text for that row.
pub type StatusOutcome = std::result::Result<StatusRecord, String>;

/// A control request forwarded to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Bring the service up (`s6-svc -u`)
    Up,
    /// Take the service down (`s6-svc -d`)
    Down,
    /// Restart a running service (`s6-svc -r`)
    Restart,
    /// Send a raw signal (`s6-svc -s N`)
    Signal(Signal),
}

impl ControlAction {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Up => "up".to_string(),
            Self::Down => "down".to_string(),
            Self::Restart => "restart".to_string(),
            Self::Signal(sig) => format!("signal {}", sig.name),
        }
    }
}
