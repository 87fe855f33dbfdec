//! In-memory supervisor for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use s6dash_core::{ControlAction, DashError, LineStream, Result, ServiceRef, StatusRecord, Supervisor};
use tokio::sync::mpsc;

/// Line stream fed from a channel. Ends when every sender is gone.
pub struct ChannelStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl LineStream for ChannelStream {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

/// Scripted [`Supervisor`]: fixed statuses, recorded controls, and log
/// streams handed out once per call to [`FakeSupervisor::add_log`].
#[derive(Default)]
pub struct FakeSupervisor {
    statuses: Mutex<HashMap<String, std::result::Result<StatusRecord, String>>>,
    logs: Mutex<HashMap<String, mpsc::UnboundedReceiver<String>>>,
    controls: Mutex<Vec<(String, ControlAction)>>,
    fail_controls: bool,
}

impl FakeSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every control request fail.
    pub fn failing_controls() -> Self {
        Self {
            fail_controls: true,
            ..Self::default()
        }
    }

    pub fn set_status(&self, name: &str, status: std::result::Result<StatusRecord, String>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
    }

    /// Register a log for `name`; lines sent on the returned handle appear
    /// in the stream.
    pub fn add_log(&self, name: &str) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.logs.lock().unwrap().insert(name.to_string(), rx);
        tx
    }

    pub fn controls(&self) -> Vec<(String, ControlAction)> {
        self.controls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Supervisor for FakeSupervisor {
    async fn query_status(&self, service: &ServiceRef) -> Result<StatusRecord> {
        match self.statuses.lock().unwrap().get(service.name()) {
            Some(Ok(record)) => Ok(record.clone()),
            Some(Err(message)) => Err(DashError::status_parse(service.name(), message.clone())),
            None => Err(DashError::status_parse(service.name(), "no status")),
        }
    }

    async fn send_control(&self, service: &ServiceRef, action: ControlAction) -> Result<()> {
        self.controls
            .lock()
            .unwrap()
            .push((service.name().to_string(), action));
        if self.fail_controls {
            return Err(DashError::internal("control refused"));
        }
        Ok(())
    }

    async fn open_log_follow(&self, service: &ServiceRef) -> Result<Box<dyn LineStream>> {
        match self.logs.lock().unwrap().remove(service.name()) {
            Some(rx) => Ok(Box::new(ChannelStream { rx })),
            None => Err(DashError::LogNotFound {
                service: service.name().to_string(),
                tried: vec![service.dir().join("log/current")],
            }),
        }
    }
}

/// A record with the given flags and otherwise neutral values.
pub fn record(up: bool, wanted_up: bool, ready: bool) -> StatusRecord {
    StatusRecord {
        up,
        wanted_up,
        ready,
        pid: if up { 4242 } else { -1 },
        exit_code: if up { -1 } else { 1 },
        signal: if up { "NA".to_string() } else { "SIGTERM".to_string() },
        up_for: std::time::Duration::from_secs(75),
        ready_for: std::time::Duration::from_secs(70),
    }
}

/// Service refs under `/run/service` for the given names.
pub fn services(names: &[&str]) -> std::sync::Arc<[ServiceRef]> {
    names
        .iter()
        .map(|n| ServiceRef::new(format!("/run/service/{n}")))
        .collect()
}
