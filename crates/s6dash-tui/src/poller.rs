//! Periodic status polling.
//!
//! The poller runs on its own task. Each cycle queries every service
//! concurrently and publishes one [`Snapshot`]. Cycles come from a fixed
//! interval plus on-demand requests through a [`PollTrigger`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::join_all;
use s6dash_core::{ServiceRef, StatusOutcome, Supervisor};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::update::{UiUpdate, UpdateSender};

/// Default period between scheduled polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Status of every service from one poll cycle, in registry order.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cycle: u64,
    pub rows: Arc<[StatusOutcome]>,
}

impl Snapshot {
    /// Row for the service at `index`.
    pub fn get(&self, index: usize) -> Option<&StatusOutcome> {
        self.rows.get(index)
    }
}

/// Asks the poller for an extra cycle.
///
/// Requests made while one is already pending are merged into it.
#[derive(Debug, Clone, Default)]
pub struct PollTrigger {
    notify: Arc<Notify>,
}

impl PollTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request one poll as soon as possible.
    pub fn request(&self) {
        self.notify.notify_one();
    }

    /// Wait for a request.
    pub(crate) async fn requested(&self) {
        self.notify.notified().await;
    }

    /// Drop a request that the poll about to start already covers.
    fn clear(&self) {
        let _ = self.notify.notified().now_or_never();
    }
}

/// Polls all services on a schedule.
pub struct Poller {
    supervisor: Arc<dyn Supervisor>,
    services: Arc<[ServiceRef]>,
    interval: Duration,
    trigger: PollTrigger,
}

impl Poller {
    pub fn new(
        supervisor: Arc<dyn Supervisor>,
        services: Arc<[ServiceRef]>,
        interval: Duration,
        trigger: PollTrigger,
    ) -> Self {
        Self {
            supervisor,
            services,
            interval,
            trigger,
        }
    }

    /// Query every service once.
    ///
    /// A failed query becomes that row's error text and does not affect
    /// the other rows.
    pub async fn poll_once(&self, cycle: u64) -> Snapshot {
        let queries = self
            .services
            .iter()
            .map(|service| self.supervisor.query_status(service));
        let rows: Arc<[StatusOutcome]> = join_all(queries)
            .await
            .into_iter()
            .map(|result| result.map_err(|e| e.to_string()))
            .collect();

        let failed = rows.iter().filter(|r| r.is_err()).count();
        trace!(cycle, services = rows.len(), failed, "poll complete");
        Snapshot { cycle, rows }
    }

    /// Start polling on a background task. The first cycle runs at once.
    pub fn spawn(self, tx: UpdateSender) -> PollerHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycle = 0u64;

            debug!(
                interval_ms = self.interval.as_millis() as u64,
                services = self.services.len(),
                "status poller started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = self.trigger.requested() => trace!("extra poll requested"),
                }

                self.trigger.clear();
                cycle += 1;
                let snapshot = self.poll_once(cycle).await;
                if tx.send(UiUpdate::Snapshot(snapshot)).is_err() {
                    debug!("update queue closed, stopping poller");
                    break;
                }
            }
        });
        PollerHandle { task }
    }
}

/// Running poller task.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling and wait for the task to finish.
    ///
    /// In-flight status commands are killed with their futures.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        debug!("status poller stopped");
    }
}
