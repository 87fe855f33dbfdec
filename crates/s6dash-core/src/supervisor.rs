//! Access to the process supervisor.
//!
//! The dashboard only ever talks to s6 through the [`Supervisor`] trait:
//! read a service's status, ask for a state change, follow its log.
//! [`S6Supervisor`] implements it with `s6-svstat`, `s6-svc` and the
//! service's s6-log `current` file.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{DashError, Result};
use crate::follow::{FileFollower, FollowConfig, LineStream};
use crate::types::{ControlAction, ServiceRef, StatusRecord};

/// Fields requested from `s6-svstat`, in output order.
pub const SVSTAT_FIELDS: &str = "up,wantedup,ready,pid,exitcode,signal,updownfor,readyfor";

/// Number of whitespace-separated fields in a valid `s6-svstat` reply.
const SVSTAT_FIELD_COUNT: usize = 8;

/// Log file locations tried in order. `{dir}` is the service directory and
/// `{name}` the service name.
pub const DEFAULT_LOG_SEARCH: [&str; 3] = [
    "{dir}/log/current",
    "{dir}/log/main/current",
    "/var/log/{name}/current",
];

/// Operations the dashboard needs from the supervisor.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Current status of one service.
    async fn query_status(&self, service: &ServiceRef) -> Result<StatusRecord>;

    /// Ask the supervisor to act on a service.
    async fn send_control(&self, service: &ServiceRef, action: ControlAction) -> Result<()>;

    /// Open the service's active log, positioned at its start.
    async fn open_log_follow(&self, service: &ServiceRef) -> Result<Box<dyn LineStream>>;
}

/// Resolves the log file for a service from a list of path templates.
#[derive(Debug, Clone)]
pub struct LogLocator {
    templates: Vec<String>,
}

impl Default for LogLocator {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_SEARCH.iter().map(|t| t.to_string()).collect())
    }
}

impl LogLocator {
    pub fn new(templates: Vec<String>) -> Self {
        Self { templates }
    }

    /// Candidate paths for `service`, in search order.
    pub fn candidates(&self, service: &ServiceRef) -> Vec<PathBuf> {
        let dir = service.dir().display().to_string();
        self.templates
            .iter()
            .map(|t| PathBuf::from(t.replace("{dir}", &dir).replace("{name}", service.name())))
            .collect()
    }

    /// First candidate that exists as a file.
    pub async fn locate(&self, service: &ServiceRef) -> Result<PathBuf> {
        let candidates = self.candidates(service);
        for path in &candidates {
            if let Ok(metadata) = tokio::fs::metadata(path).await {
                if metadata.is_file() {
                    return Ok(path.clone());
                }
            }
        }
        Err(DashError::LogNotFound {
            service: service.name().to_string(),
            tried: candidates,
        })
    }
}

/// [`Supervisor`] backed by the s6 command-line tools.
#[derive(Debug, Clone)]
pub struct S6Supervisor {
    svstat: String,
    svc: String,
    locator: LogLocator,
    follow_poll: Duration,
}

impl Default for S6Supervisor {
    fn default() -> Self {
        Self {
            svstat: "s6-svstat".to_string(),
            svc: "s6-svc".to_string(),
            locator: LogLocator::default(),
            follow_poll: Duration::from_millis(crate::follow::DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl S6Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different program names or paths for `s6-svstat` and `s6-svc`.
    pub fn with_programs(mut self, svstat: impl Into<String>, svc: impl Into<String>) -> Self {
        self.svstat = svstat.into();
        self.svc = svc.into();
        self
    }

    /// Set how log files are found.
    pub fn with_log_locator(mut self, locator: LogLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Set the EOF poll interval used when following logs.
    pub fn with_follow_poll(mut self, interval: Duration) -> Self {
        self.follow_poll = interval;
        self
    }

    /// Run `program args.. <service dir>` and return its stdout.
    async fn run(&self, program: &str, args: &[&str], service: &ServiceRef) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .arg(service.dir())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DashError::CommandSpawn {
                program: program.to_string(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DashError::CommandFailed {
                program: program.to_string(),
                service: service.name().to_string(),
                status: output.status,
                output: [stdout.trim(), stderr.trim()]
                    .iter()
                    .filter(|s| !s.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join(" "),
            });
        }
        Ok(stdout)
    }
}

#[async_trait]
impl Supervisor for S6Supervisor {
    #[instrument(level = "debug", skip_all, fields(service = %service))]
    async fn query_status(&self, service: &ServiceRef) -> Result<StatusRecord> {
        let stdout = self.run(&self.svstat, &["-o", SVSTAT_FIELDS], service).await?;
        parse_svstat(service.name(), &stdout)
    }

    #[instrument(level = "debug", skip_all, fields(service = %service, action = %action.describe()))]
    async fn send_control(&self, service: &ServiceRef, action: ControlAction) -> Result<()> {
        let signal_number;
        let args: Vec<&str> = match action {
            ControlAction::Up => vec!["-u"],
            ControlAction::Down => vec!["-d"],
            ControlAction::Restart => vec!["-r"],
            ControlAction::Signal(sig) => {
                signal_number = sig.number.to_string();
                vec!["-s", signal_number.as_str()]
            }
        };
        self.run(&self.svc, &args, service).await?;
        debug!("control sent");
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(service = %service))]
    async fn open_log_follow(&self, service: &ServiceRef) -> Result<Box<dyn LineStream>> {
        let path = self.locator.locate(service).await?;
        let config = FollowConfig::new(path).with_poll_interval(self.follow_poll);
        let follower = FileFollower::open(config).await?;
        Ok(Box::new(follower))
    }
}

/// Parse one line of `s6-svstat -o` output in [`SVSTAT_FIELDS`] order.
///
/// Anything but exactly eight well-formed fields is rejected.
pub fn parse_svstat(service: &str, output: &str) -> Result<StatusRecord> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    if fields.len() != SVSTAT_FIELD_COUNT {
        return Err(DashError::status_parse(
            service,
            format!(
                "expected {SVSTAT_FIELD_COUNT} fields, got {}: {:?}",
                fields.len(),
                output.trim()
            ),
        ));
    }

    let flag = |name: &str, value: &str| -> Result<bool> {
        match value {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(DashError::status_parse(
                service,
                format!("{name}: expected true/false, got {other:?}"),
            )),
        }
    };
    let int = |name: &str, value: &str| -> Result<i64> {
        value.parse::<i64>().map_err(|e| {
            DashError::status_parse(service, format!("{name}: {e} ({value:?})"))
        })
    };
    let secs = |name: &str, value: &str| -> Result<Duration> {
        value.parse::<u64>().map(Duration::from_secs).map_err(|e| {
            DashError::status_parse(service, format!("{name}: {e} ({value:?})"))
        })
    };

    Ok(StatusRecord {
        up: flag("up", fields[0])?,
        wanted_up: flag("wantedup", fields[1])?,
        ready: flag("ready", fields[2])?,
        pid: int("pid", fields[3])?,
        exit_code: int("exitcode", fields[4])?,
        signal: fields[5].to_string(),
        up_for: secs("updownfor", fields[6])?,
        ready_for: secs("readyfor", fields[7])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_parse_running_service() {
        let record = parse_svstat("web", "true true true 4242 -1 NA 120 118\n").unwrap();
        assert!(record.up);
        assert!(record.wanted_up);
        assert!(record.ready);
        assert_eq!(record.pid, 4242);
        assert_eq!(record.exit_code, -1);
        assert_eq!(record.signal, "NA");
        assert_eq!(record.up_for, Duration::from_secs(120));
        assert_eq!(record.ready_for, Duration::from_secs(118));
    }

    #[test]
    fn test_parse_crashed_service() {
        let record = parse_svstat("web", "false true false -1 -1 SIGSEGV 3 0").unwrap();
        assert!(!record.up);
        assert!(record.wanted_up);
        assert_eq!(record.signal, "SIGSEGV");
    }

    #[test]
    fn test_short_output_is_rejected() {
        let err = parse_svstat("web", "true true true 1").unwrap_err();
        assert!(matches!(err, DashError::StatusParse { .. }));
        assert!(err.to_string().contains("expected 8 fields, got 4"));
    }

    #[test]
    fn test_extra_fields_are_rejected() {
        assert!(parse_svstat("web", "true true true 1 0 NA 1 1 extra").is_err());
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(parse_svstat("web", "yes true true 1 0 NA 1 1").is_err());
        assert!(parse_svstat("web", "true true true abc 0 NA 1 1").is_err());
        assert!(parse_svstat("web", "true true true 1 0 NA -5 1").is_err());
    }

    #[test]
    fn test_locator_expands_templates() {
        let svc = ServiceRef::new("/run/service/cron");
        let paths = LogLocator::default().candidates(&svc);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/run/service/cron/log/current"),
                PathBuf::from("/run/service/cron/log/main/current"),
                PathBuf::from("/var/log/cron/current"),
            ]
        );
    }

    #[tokio::test]
    async fn test_locator_picks_first_existing() {
        let temp = TempDir::new().unwrap();
        let svc_dir = temp.path().join("cron");
        fs::create_dir_all(svc_dir.join("log/main")).unwrap();
        fs::write(svc_dir.join("log/main/current"), "line\n").unwrap();

        let svc = ServiceRef::new(&svc_dir);
        let found = LogLocator::default().locate(&svc).await.unwrap();
        assert_eq!(found, svc_dir.join("log/main/current"));
    }

    #[tokio::test]
    async fn test_locator_reports_all_candidates() {
        let temp = TempDir::new().unwrap();
        let svc = ServiceRef::new(temp.path().join("ghost"));
        let locator = LogLocator::new(vec!["{dir}/a".into(), "{dir}/b".into()]);

        let err = locator.locate(&svc).await.unwrap_err();
        match err {
            DashError::LogNotFound { service, tried } => {
                assert_eq!(service, "ghost");
                assert_eq!(tried.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Write a shell script standing in for an s6 tool.
    fn fake_tool(dir: &std::path::Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    #[serial]
    async fn test_query_status_runs_svstat() {
        let temp = TempDir::new().unwrap();
        let svstat = fake_tool(temp.path(), "svstat", "echo true false false 77 -1 NA 9 0");
        let supervisor = S6Supervisor::new().with_programs(svstat, "true");

        let record = supervisor
            .query_status(&ServiceRef::new("/run/service/web"))
            .await
            .unwrap();
        assert!(record.up);
        assert!(!record.wanted_up);
        assert_eq!(record.pid, 77);
    }

    #[tokio::test]
    #[serial]
    async fn test_query_status_failure_carries_output() {
        let temp = TempDir::new().unwrap();
        let svstat = fake_tool(temp.path(), "svstat", "echo 'supervisor not listening' >&2; exit 1");
        let supervisor = S6Supervisor::new().with_programs(svstat, "true");

        let err = supervisor
            .query_status(&ServiceRef::new("/run/service/web"))
            .await
            .unwrap_err();
        assert!(matches!(err, DashError::CommandFailed { .. }));
        assert!(err.to_string().contains("supervisor not listening"));
    }

    #[tokio::test]
    #[serial]
    async fn test_send_control_passes_flags() {
        let temp = TempDir::new().unwrap();
        let record = temp.path().join("args");
        let svc = fake_tool(
            temp.path(),
            "svc",
            &format!("printf '%s\\n' \"$*\" >> {}", record.display()),
        );
        let supervisor = S6Supervisor::new().with_programs("true", svc);
        let service = ServiceRef::new("/run/service/web");

        supervisor.send_control(&service, ControlAction::Restart).await.unwrap();
        let term = crate::signal::signal_for_key('T').unwrap();
        supervisor
            .send_control(&service, ControlAction::Signal(term))
            .await
            .unwrap();

        let calls = fs::read_to_string(&record).unwrap();
        let lines: Vec<_> = calls.lines().collect();
        assert_eq!(lines[0], "-r /run/service/web");
        assert_eq!(lines[1], format!("-s {} /run/service/web", libc::SIGTERM));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let supervisor = S6Supervisor::new().with_programs("/nonexistent/s6-svstat", "true");
        let err = supervisor
            .query_status(&ServiceRef::new("/run/service/web"))
            .await
            .unwrap_err();
        assert!(matches!(err, DashError::CommandSpawn { .. }));
    }

    #[tokio::test]
    async fn test_open_log_follow_streams_lines() {
        let temp = TempDir::new().unwrap();
        let svc_dir = temp.path().join("web");
        fs::create_dir_all(svc_dir.join("log")).unwrap();
        fs::write(svc_dir.join("log/current"), "first\nsecond\n").unwrap();

        let supervisor = S6Supervisor::new().with_follow_poll(Duration::from_millis(10));
        let mut stream = supervisor
            .open_log_follow(&ServiceRef::new(&svc_dir))
            .await
            .unwrap();
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("second"));
    }
}
