//! Configuration for s6dash.
//!
//! Settings are read once at startup from `~/.s6dash/config.yaml` (or the
//! file given with `--config`). Every field has a default, so a missing file
//! or a partial one is fine.
//!
//! ```yaml
//! poll:
//!   interval_ms: 1000
//! log:
//!   debounce_ms: 500
//!   max_lines: 50000
//!   follow_poll_ms: 100
//!   search:
//!     - "{dir}/log/current"
//!     - "/var/log/{name}/current"
//! input:
//!   chord_timeout_ms: 500
//! commands:
//!   svstat: s6-svstat
//!   svc: s6-svc
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use s6dash_core::supervisor::DEFAULT_LOG_SEARCH;
use s6dash_core::{DashError, LogLocator, Result, S6Supervisor};

/// Default config file path: `~/.s6dash/config.yaml`.
pub fn config_path() -> Result<PathBuf> {
    Ok(s6dash_core::logging::home_dir()?.join("config.yaml"))
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DashConfig {
    /// Status polling
    #[serde(default)]
    pub poll: PollConfig,

    /// Log panel
    #[serde(default)]
    pub log: LogConfig,

    /// Keyboard handling
    #[serde(default)]
    pub input: InputConfig,

    /// s6 tool names
    #[serde(default)]
    pub commands: CommandsConfig,
}

impl DashConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(DashError::config_not_found(path));
                }
                Self::load_from(path)
            }
            None => {
                let path = config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load and validate a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DashError::ConfigNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;
        let config = Self::parse(&content, path)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse configuration from a YAML string. `path` is used in errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| DashError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(DashError::ConfigValidation { message });

        if self.poll.interval_ms < 100 {
            return fail(format!(
                "poll.interval_ms must be >= 100, got {}",
                self.poll.interval_ms
            ));
        }
        if self.log.debounce_ms == 0 {
            return fail("log.debounce_ms must be > 0".to_string());
        }
        if self.log.max_lines == 0 {
            return fail("log.max_lines must be > 0".to_string());
        }
        if self.log.follow_poll_ms == 0 {
            return fail("log.follow_poll_ms must be > 0".to_string());
        }
        if self.log.search.is_empty() {
            return fail("log.search must list at least one path".to_string());
        }
        if self.input.chord_timeout_ms == 0 {
            return fail("input.chord_timeout_ms must be > 0".to_string());
        }
        if self.commands.svstat.trim().is_empty() || self.commands.svc.trim().is_empty() {
            return fail("commands.svstat and commands.svc must not be empty".to_string());
        }
        Ok(())
    }

    /// Build the s6 supervisor described by this configuration.
    pub fn supervisor(&self) -> S6Supervisor {
        S6Supervisor::new()
            .with_programs(&self.commands.svstat, &self.commands.svc)
            .with_log_locator(LogLocator::new(self.log.search.clone()))
            .with_follow_poll(Duration::from_millis(self.log.follow_poll_ms))
    }
}

/// Status polling configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PollConfig {
    /// Period between scheduled polls in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Log panel configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Quiet period that ends the initial replay burst, in milliseconds.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Lines kept in the log panel before the oldest are dropped.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Wait between end-of-file checks while following, in milliseconds.
    #[serde(default = "default_follow_poll")]
    pub follow_poll_ms: u64,

    /// Log file templates tried in order (`{dir}`, `{name}`).
    #[serde(default = "default_search")]
    pub search: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            max_lines: default_max_lines(),
            follow_poll_ms: default_follow_poll(),
            search: default_search(),
        }
    }
}

impl LogConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Keyboard configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Window for two-key chords such as `gg`, in milliseconds.
    #[serde(default = "default_chord_timeout")]
    pub chord_timeout_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            chord_timeout_ms: default_chord_timeout(),
        }
    }
}

impl InputConfig {
    pub fn chord_timeout(&self) -> Duration {
        Duration::from_millis(self.chord_timeout_ms)
    }
}

/// Names or paths of the s6 tools.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CommandsConfig {
    #[serde(default = "default_svstat")]
    pub svstat: String,

    #[serde(default = "default_svc")]
    pub svc: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            svstat: default_svstat(),
            svc: default_svc(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_debounce() -> u64 {
    500
}

fn default_max_lines() -> usize {
    50_000
}

fn default_follow_poll() -> u64 {
    s6dash_core::follow::DEFAULT_POLL_INTERVAL_MS
}

fn default_search() -> Vec<String> {
    DEFAULT_LOG_SEARCH.iter().map(|s| s.to_string()).collect()
}

fn default_chord_timeout() -> u64 {
    500
}

fn default_svstat() -> String {
    "s6-svstat".to_string()
}

fn default_svc() -> String {
    "s6-svc".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> Result<DashConfig> {
        DashConfig::parse(yaml, Path::new("test.yaml"))
    }

    #[test]
    fn test_defaults() {
        let config = DashConfig::default();
        assert_eq!(config.poll.interval(), Duration::from_secs(1));
        assert_eq!(config.log.debounce(), Duration::from_millis(500));
        assert_eq!(config.input.chord_timeout(), Duration::from_millis(500));
        assert_eq!(config.commands.svstat, "s6-svstat");
        assert_eq!(config.log.search.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = parse("log:\n  debounce_ms: 250\n").unwrap();
        assert_eq!(config.log.debounce_ms, 250);
        assert_eq!(config.log.max_lines, 50_000);
        assert_eq!(config.poll.interval_ms, 1000);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("  \n").unwrap(), DashConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse("poll: [not, a, map").unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(err, DashError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_validation_rejects_fast_polling() {
        let config = parse("poll:\n  interval_ms: 10\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll.interval_ms"));
    }

    #[test]
    fn test_validation_rejects_empty_search() {
        let config = parse("log:\n  search: []\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_missing_path() {
        let temp = TempDir::new().unwrap();
        let err = DashConfig::load(Some(&temp.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, DashError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "commands:\n  svc: /usr/local/bin/s6-svc\n").unwrap();

        let config = DashConfig::load(Some(&path)).unwrap();
        assert_eq!(config.commands.svc, "/usr/local/bin/s6-svc");
        assert_eq!(config.commands.svstat, "s6-svstat");
    }

    #[test]
    #[serial]
    fn test_default_path_missing_gives_defaults() {
        let temp = TempDir::new().unwrap();
        // SAFETY: serialized with every other test that touches HOME
        unsafe { std::env::set_var("HOME", temp.path()) };
        assert_eq!(DashConfig::load(None).unwrap(), DashConfig::default());
        assert_eq!(
            config_path().unwrap(),
            temp.path().join(".s6dash").join("config.yaml")
        );
    }
}
