//! Fire-and-forget control commands.

use std::sync::Arc;

use s6dash_core::{ControlAction, ServiceRef, Supervisor};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::poller::PollTrigger;

/// Sends control actions without blocking the render loop.
///
/// Failures are logged and never reach the screen. Every dispatch, failed
/// or not, ends with a poll request so the list reflects the new state
/// without waiting for the next tick.
#[derive(Clone)]
pub struct Dispatcher {
    supervisor: Arc<dyn Supervisor>,
    trigger: PollTrigger,
}

impl Dispatcher {
    pub fn new(supervisor: Arc<dyn Supervisor>, trigger: PollTrigger) -> Self {
        Self {
            supervisor,
            trigger,
        }
    }

    /// Send `action` to `target` on a background task.
    ///
    /// Returns `None` without doing anything when there is no target.
    pub fn dispatch(
        &self,
        target: Option<&ServiceRef>,
        action: ControlAction,
    ) -> Option<JoinHandle<()>> {
        let Some(service) = target.cloned() else {
            debug!(action = %action.describe(), "no service selected, ignoring");
            return None;
        };

        let supervisor = Arc::clone(&self.supervisor);
        let trigger = self.trigger.clone();
        Some(tokio::spawn(async move {
            match supervisor.send_control(&service, action).await {
                Ok(()) => info!(service = %service, action = %action.describe(), "control sent"),
                Err(e) => warn!(
                    service = %service,
                    action = %action.describe(),
                    error = %e,
                    "control command failed"
                ),
            }
            trigger.request();
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSupervisor, services};
    use std::time::Duration;
    use tokio::time::timeout;

    async fn poll_requested(trigger: &PollTrigger) -> bool {
        timeout(Duration::from_millis(50), trigger.requested())
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn test_dispatch_sends_and_requests_poll() {
        let fake = Arc::new(FakeSupervisor::new());
        let trigger = PollTrigger::new();
        let dispatcher = Dispatcher::new(fake.clone(), trigger.clone());
        let svcs = services(&["web"]);

        dispatcher
            .dispatch(svcs.first(), ControlAction::Restart)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(fake.controls(), vec![("web".to_string(), ControlAction::Restart)]);
        assert!(poll_requested(&trigger).await);
    }

    #[tokio::test]
    async fn test_failed_control_still_requests_poll() {
        let fake = Arc::new(FakeSupervisor::failing_controls());
        let trigger = PollTrigger::new();
        let dispatcher = Dispatcher::new(fake.clone(), trigger.clone());
        let svcs = services(&["web"]);

        dispatcher
            .dispatch(svcs.first(), ControlAction::Down)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(fake.controls().len(), 1);
        assert!(poll_requested(&trigger).await);
    }

    #[tokio::test]
    async fn test_no_target_is_a_no_op() {
        let fake = Arc::new(FakeSupervisor::new());
        let trigger = PollTrigger::new();
        let dispatcher = Dispatcher::new(fake.clone(), trigger.clone());

        assert!(dispatcher.dispatch(None, ControlAction::Up).is_none());
        assert!(fake.controls().is_empty());
        assert!(!poll_requested(&trigger).await);
    }
}
