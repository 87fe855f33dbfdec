//! Terminal UI for s6dash.
//!
//! This crate provides the ratatui-based dashboard: a live list of the
//! services under one scan directory, with an optional log panel.
//!
//! ## Components
//!
//! - [`poller`] - Periodic status snapshots
//! - [`dispatcher`] - Control commands sent in the background
//! - [`log_tail`] - Log sessions and their replay/follow state machine
//! - [`event`] - Key handling, including the `gg` chord
//! - [`app`] - View state and the render loop
//!
//! ## Hotkeys
//!
//! - `↑`/`k`, `↓`/`j` - Move selection
//! - `gg`, `G` - First / last service
//! - `Enter` - Toggle the log panel
//! - `Home`/`End`/`PgUp`/`PgDn` (or `Ctrl-A/E/U/D`) - Scroll the log
//! - `u`, `d`, `r` - Up, down, restart
//! - `A B Q H K T I 1 2 P C Y` - Send a signal
//! - `?` - Help
//! - `q` - Quit

pub mod app;
pub mod dispatcher;
pub mod event;
pub mod input;
pub mod log_tail;
pub mod poller;
pub mod update;
pub mod view;

#[cfg(test)]
mod testing;

pub use app::{App, AppResult};
pub use log_tail::{LogTailController, LogUpdate, TailEvent, TailState};
pub use poller::{PollTrigger, Poller, PollerHandle, Snapshot};
pub use update::UiUpdate;
