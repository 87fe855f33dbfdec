//! Log panel sessions.
//!
//! Opening a log replays the whole `current` file before live lines start
//! arriving. The replay comes in as a burst; once no line has arrived for
//! the debounce window the session is considered settled and the panel
//! jumps to the end and follows.
//!
//! ```text
//!            open            Opened          Settled
//!   Idle ──────────▶ Opening ──────▶ Bursting ──────▶ Steady
//!    ▲                  │                              │
//!    └──────────────────┴── OpenFailed / Closed / close┘
//! ```
//!
//! Only one session exists at a time. Each one runs on its own task,
//! carries a session id, and stops emitting as soon as it is cancelled.
//! The controller also drops any update whose id is not the active
//! session, so a retired session can never write into the panel.

use std::sync::Arc;
use std::time::Duration;

use s6dash_core::{ServiceRef, Supervisor};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::update::{UiUpdate, UpdateSender};

/// Default quiet period that ends the replay burst.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Where the active session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Idle,
    Opening,
    Bursting,
    Steady,
}

/// Something that happened in a log session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// The log file was found and is being read
    Opened,
    /// One line, in file order
    Line(String),
    /// The log could not be opened; the session is over
    OpenFailed(String),
    /// The replay burst is over
    Settled,
    /// The stream ended, with the read error if there was one
    Closed(Option<String>),
}

/// A [`TailEvent`] tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogUpdate {
    pub session: u64,
    pub event: TailEvent,
}

/// The active follow task.
struct LogSession {
    id: u64,
    service: ServiceRef,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the log session and its state machine.
pub struct LogTailController {
    supervisor: Arc<dyn Supervisor>,
    tx: UpdateSender,
    debounce: Duration,
    next_id: u64,
    session: Option<LogSession>,
    state: TailState,
}

impl LogTailController {
    pub fn new(supervisor: Arc<dyn Supervisor>, tx: UpdateSender, debounce: Duration) -> Self {
        Self {
            supervisor,
            tx,
            debounce,
            next_id: 0,
            session: None,
            state: TailState::Idle,
        }
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    /// Service whose log is open, if any.
    pub fn service(&self) -> Option<&ServiceRef> {
        self.session.as_ref().map(|s| &s.service)
    }

    /// Id of the active session.
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Start following `service`, replacing any current session.
    ///
    /// The previous session's task has fully stopped when this returns.
    pub async fn open(&mut self, service: ServiceRef) -> u64 {
        self.teardown().await;

        self.next_id += 1;
        let id = self.next_id;
        let (cancel, cancel_rx) = watch::channel(false);
        let emitter = Emitter {
            session: id,
            tx: self.tx.clone(),
            cancel: cancel_rx,
        };
        let task = tokio::spawn(follow(
            Arc::clone(&self.supervisor),
            service.clone(),
            self.debounce,
            emitter,
        ));

        info!(session = id, service = %service, "opening log");
        self.session = Some(LogSession {
            id,
            service,
            cancel,
            task,
        });
        self.state = TailState::Opening;
        id
    }

    /// Stop the current session, if any.
    pub async fn close(&mut self) {
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.cancel.send(true);
            session.task.abort();
            let _ = session.task.await;
            debug!(session = session.id, service = %session.service, "log session stopped");
        }
        self.state = TailState::Idle;
    }

    /// Apply an update to the state machine.
    ///
    /// Returns `false` for updates from a session that is no longer active;
    /// those must not reach the view.
    pub fn accept(&mut self, update: &LogUpdate) -> bool {
        if self.session_id() != Some(update.session) {
            return false;
        }
        self.state = match &update.event {
            TailEvent::Opened => TailState::Bursting,
            TailEvent::Line(_) => self.state,
            TailEvent::Settled => TailState::Steady,
            TailEvent::OpenFailed(_) | TailEvent::Closed(_) => TailState::Idle,
        };
        true
    }
}

/// Sends session events while the session is live.
struct Emitter {
    session: u64,
    tx: UpdateSender,
    cancel: watch::Receiver<bool>,
}

impl Emitter {
    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Returns `false` once the session is cancelled or nobody listens.
    fn emit(&self, event: TailEvent) -> bool {
        if self.cancelled() {
            return false;
        }
        let update = LogUpdate {
            session: self.session,
            event,
        };
        self.tx.send(UiUpdate::Log(update)).is_ok()
    }
}

/// Body of a session task.
async fn follow(
    supervisor: Arc<dyn Supervisor>,
    service: ServiceRef,
    debounce: Duration,
    emitter: Emitter,
) {
    let mut stream = match supervisor.open_log_follow(&service).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(service = %service, error = %e, "failed to open log");
            emitter.emit(TailEvent::OpenFailed(e.to_string()));
            return;
        }
    };
    if !emitter.emit(TailEvent::Opened) {
        return;
    }

    let mut cancelled = emitter.cancel.clone();
    let settle = tokio::time::sleep(debounce);
    tokio::pin!(settle);
    let mut in_burst = true;
    let mut replayed = 0u64;

    loop {
        tokio::select! {
            biased;

            _ = cancelled.changed() => return,

            line = stream.next_line() => match line {
                Ok(Some(line)) => {
                    if !emitter.emit(TailEvent::Line(line)) {
                        return;
                    }
                    if in_burst {
                        replayed += 1;
                        settle.as_mut().reset(Instant::now() + debounce);
                    }
                }
                Ok(None) => {
                    debug!(service = %service, "log stream ended");
                    emitter.emit(TailEvent::Closed(None));
                    return;
                }
                Err(e) => {
                    warn!(service = %service, error = %e, "log stream failed");
                    emitter.emit(TailEvent::Closed(Some(e.to_string())));
                    return;
                }
            },

            _ = &mut settle, if in_burst => {
                in_burst = false;
                debug!(service = %service, lines = replayed, "log replay settled");
                if !emitter.emit(TailEvent::Settled) {
                    return;
                }
            }
        }
    }
}
