//! Terminal input reader.
//!
//! crossterm's event API blocks, so events are read on a dedicated thread
//! and forwarded into the update queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event};
use tracing::{debug, error, warn};

use crate::update::{UiUpdate, UpdateSender};

/// How long one wait for input lasts before the stop flag is checked.
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Handle to the input thread.
pub struct InputReader {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl InputReader {
    /// Start reading terminal events into `tx`.
    pub fn spawn(tx: UpdateSender) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("s6dash-input".to_string())
            .spawn(move || read_events(&tx, &flag))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop the thread and wait for it. Takes at most one poll interval.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("input thread panicked");
            }
        }
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn read_events(tx: &UpdateSender, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        match event::poll(INPUT_POLL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                error!(error = %e, "polling terminal input failed");
                break;
            }
        }

        let update = match event::read() {
            Ok(Event::Key(key)) => UiUpdate::Input(key),
            Ok(Event::Mouse(mouse)) => UiUpdate::Mouse(mouse),
            Ok(Event::Resize(..)) => UiUpdate::Resize,
            Ok(_) => continue,
            Err(e) => {
                error!(error = %e, "reading terminal input failed");
                break;
            }
        };
        if tx.send(update).is_err() {
            break;
        }
    }
    debug!("input reader stopped");
}
