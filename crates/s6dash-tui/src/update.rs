//! Messages delivered to the render loop.
//!
//! Every producer (status poller, log session, terminal input thread) sends
//! [`UiUpdate`]s into one unbounded queue. The render loop is its only
//! consumer, so view state is never touched from anywhere else.

use crossterm::event::{KeyEvent, MouseEvent};
use tokio::sync::mpsc;

use crate::log_tail::LogUpdate;
use crate::poller::Snapshot;

/// One message for the render loop.
#[derive(Debug, Clone)]
pub enum UiUpdate {
    /// A key press from the terminal
    Input(KeyEvent),
    /// A mouse event from the terminal
    Mouse(MouseEvent),
    /// The terminal was resized
    Resize,
    /// A completed status poll
    Snapshot(Snapshot),
    /// Output of the active log session
    Log(LogUpdate),
}

pub type UpdateSender = mpsc::UnboundedSender<UiUpdate>;
pub type UpdateReceiver = mpsc::UnboundedReceiver<UiUpdate>;

/// Create the update queue.
pub fn channel() -> (UpdateSender, UpdateReceiver) {
    mpsc::unbounded_channel()
}
