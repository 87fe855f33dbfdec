//! Keyboard input handling for the s6dash TUI.
//!
//! [`InputHandler`] turns raw key events into [`AppEvent`]s. It holds the
//! only input state there is: whether the help modal has the keyboard, and a
//! pending `g` waiting for its partner.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use s6dash_core::{ControlAction, signal_for_key};

/// Default window for the `gg` chord.
pub const DEFAULT_CHORD_TIMEOUT: Duration = Duration::from_millis(500);

/// Application-level events that can trigger state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Move selection up one row
    SelectPrev,
    /// Move selection down one row
    SelectNext,
    /// Jump to the first row (`gg`)
    SelectFirst,
    /// Jump to the last row (`G`)
    SelectLast,
    /// Scroll the log to its first line
    LogTop,
    /// Scroll the log to its last line and follow
    LogBottom,
    /// Scroll the log up one page
    LogPageUp,
    /// Scroll the log down one page
    LogPageDown,
    /// Open or close the log panel
    ToggleLog,
    /// Send a control action to the selected service
    Control(ControlAction),
    /// Show or hide the help overlay
    ToggleHelp,
    /// Close the help overlay
    CloseHelp,
    /// Repaint the whole screen
    Redraw,
    /// Request application quit
    Quit,
    /// No action needed
    None,
}

/// A key waiting for a second press.
#[derive(Debug, Clone, Copy)]
struct PendingChord {
    key: char,
    at: Instant,
}

/// Input handler for converting key events to app events.
#[derive(Debug)]
pub struct InputHandler {
    /// Whether the help modal currently owns the keyboard
    help_mode: bool,
    chord_timeout: Duration,
    pending: Option<PendingChord>,
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHandler {
    /// Create a new input handler.
    pub fn new() -> Self {
        Self::with_chord_timeout(DEFAULT_CHORD_TIMEOUT)
    }

    /// Create a handler with a custom chord window.
    pub fn with_chord_timeout(chord_timeout: Duration) -> Self {
        Self {
            help_mode: false,
            chord_timeout,
            pending: None,
        }
    }

    /// Set whether the help modal has the keyboard.
    pub fn set_help_mode(&mut self, active: bool) {
        self.help_mode = active;
    }

    /// Whether a chord key is waiting for its second press.
    pub fn has_pending_chord(&self) -> bool {
        self.pending.is_some()
    }

    /// Handle a key event and return the corresponding app event.
    pub fn handle_key(&mut self, key: KeyEvent) -> AppEvent {
        self.handle_key_at(key, Instant::now())
    }

    /// Handle a key event that arrived at `now`.
    pub fn handle_key_at(&mut self, key: KeyEvent, now: Instant) -> AppEvent {
        if key.kind == KeyEventKind::Release {
            return AppEvent::None;
        }

        let pending = self.pending.take();

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return self.handle_control(key.code);
        }

        if self.help_mode {
            return self.handle_help_mode(key.code);
        }

        self.handle_normal_mode(key.code, pending, now)
    }

    /// Ctrl combinations work the same with or without the help modal.
    fn handle_control(&self, code: KeyCode) -> AppEvent {
        match code {
            KeyCode::Char('c') => AppEvent::Quit,
            KeyCode::Char('l') => AppEvent::Redraw,
            _ if self.help_mode => AppEvent::None,
            KeyCode::Char('a') => AppEvent::LogTop,
            KeyCode::Char('e') => AppEvent::LogBottom,
            KeyCode::Char('u') => AppEvent::LogPageUp,
            KeyCode::Char('d') => AppEvent::LogPageDown,
            _ => AppEvent::None,
        }
    }

    fn handle_help_mode(&self, code: KeyCode) -> AppEvent {
        match code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?') => {
                AppEvent::CloseHelp
            }
            _ => AppEvent::None,
        }
    }

    fn handle_normal_mode(
        &mut self,
        code: KeyCode,
        pending: Option<PendingChord>,
        now: Instant,
    ) -> AppEvent {
        match code {
            KeyCode::Char('g') => {
                if let Some(p) = pending {
                    if p.key == 'g' && now.saturating_duration_since(p.at) <= self.chord_timeout {
                        return AppEvent::SelectFirst;
                    }
                }
                self.pending = Some(PendingChord { key: 'g', at: now });
                AppEvent::None
            }
            KeyCode::Char('G') => AppEvent::SelectLast,

            KeyCode::Up | KeyCode::Char('k') => AppEvent::SelectPrev,
            KeyCode::Down | KeyCode::Char('j') => AppEvent::SelectNext,
            KeyCode::Home => AppEvent::LogTop,
            KeyCode::End => AppEvent::LogBottom,
            KeyCode::PageUp => AppEvent::LogPageUp,
            KeyCode::PageDown => AppEvent::LogPageDown,

            KeyCode::Enter => AppEvent::ToggleLog,

            KeyCode::Char('u') => AppEvent::Control(ControlAction::Up),
            KeyCode::Char('d') => AppEvent::Control(ControlAction::Down),
            KeyCode::Char('r') => AppEvent::Control(ControlAction::Restart),

            KeyCode::Char('?') => AppEvent::ToggleHelp,
            KeyCode::Char('q') => AppEvent::Quit,

            KeyCode::Char(c) => match signal_for_key(c) {
                Some(sig) => AppEvent::Control(ControlAction::Signal(sig)),
                None => AppEvent::None,
            },

            _ => AppEvent::None,
        }
    }
}
