//! Main application state and render loop.
//!
//! [`App`] owns all view state and is the only consumer of the update
//! queue. The loop waits for one update, applies everything else already
//! queued, and redraws once if anything changed.

use std::io::{self, Stdout};
use std::sync::Arc;

use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use s6dash_config::DashConfig;
use s6dash_core::{DashError, ServiceRef, StatusOutcome, Supervisor};
use tracing::{debug, info, trace};

use crate::dispatcher::Dispatcher;
use crate::event::{AppEvent, InputHandler};
use crate::input::InputReader;
use crate::log_tail::{LogTailController, LogUpdate, TailEvent};
use crate::poller::{PollTrigger, Poller, Snapshot};
use crate::update::{self, UiUpdate, UpdateReceiver, UpdateSender};
use crate::view::{self, GRAY, GREEN, LogPane, RED};

/// Result type for app operations.
pub type AppResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Updates applied before a frame is forced out. Small enough that a long
/// replay visibly scrolls under the loading box.
const MAX_UPDATES_PER_FRAME: usize = 256;

/// Lines moved per mouse wheel notch over the log.
const MOUSE_SCROLL_LINES: usize = 3;

const HELP_TEXT: &str = include_str!("help.txt");
const HELP_WIDTH: u16 = 48;

/// Main application state.
pub struct App {
    services: Arc<[ServiceRef]>,
    /// Input handler for key events
    input_handler: InputHandler,
    /// Selected row in the services list
    selected: usize,
    list_state: ListState,
    /// Latest status poll
    snapshot: Option<Snapshot>,
    dispatcher: Dispatcher,
    /// Started by [`App::run`]
    poller: Option<Poller>,
    log_tail: LogTailController,
    log_pane: LogPane,
    log_visible: bool,
    show_help: bool,
    should_quit: bool,
    /// Whether the UI needs a redraw
    dirty: bool,
    /// Whether the next draw must repaint every cell
    clear_requested: bool,
    tx: UpdateSender,
    rx: UpdateReceiver,
    /// Areas from the last draw, for mouse hit testing
    list_area: Rect,
    log_area: Rect,
}

impl App {
    /// Create the app for a fixed set of services.
    pub fn new(
        services: Arc<[ServiceRef]>,
        supervisor: Arc<dyn Supervisor>,
        config: &DashConfig,
    ) -> Self {
        let (tx, rx) = update::channel();
        let trigger = PollTrigger::new();
        let poller = Poller::new(
            Arc::clone(&supervisor),
            Arc::clone(&services),
            config.poll.interval(),
            trigger.clone(),
        );
        let log_tail =
            LogTailController::new(Arc::clone(&supervisor), tx.clone(), config.log.debounce());

        Self {
            services,
            input_handler: InputHandler::with_chord_timeout(config.input.chord_timeout()),
            selected: 0,
            list_state: ListState::default(),
            snapshot: None,
            dispatcher: Dispatcher::new(supervisor, trigger),
            poller: Some(poller),
            log_tail,
            log_pane: LogPane::new(config.log.max_lines),
            log_visible: false,
            show_help: false,
            should_quit: false,
            dirty: true,
            clear_requested: false,
            tx,
            rx,
            list_area: Rect::default(),
            log_area: Rect::default(),
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn log_visible(&self) -> bool {
        self.log_visible
    }

    /// The service under the cursor, if the list is not empty.
    pub fn selected_service(&self) -> Option<&ServiceRef> {
        self.services.get(self.selected)
    }

    fn selected_outcome(&self) -> Option<&StatusOutcome> {
        self.snapshot.as_ref()?.get(self.selected)
    }

    /// Mark the UI as dirty (needs redraw).
    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check if UI needs redraw and clear the dirty flag.
    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn take_clear(&mut self) -> bool {
        std::mem::take(&mut self.clear_requested)
    }

    /// Apply one queued update.
    pub async fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Input(key) => {
                let event = self.input_handler.handle_key(key);
                self.handle_app_event(event).await;
            }
            UiUpdate::Mouse(mouse) => self.handle_mouse(mouse).await,
            UiUpdate::Resize => self.mark_dirty(),
            UiUpdate::Snapshot(snapshot) => {
                trace!(cycle = snapshot.cycle, "status snapshot");
                self.snapshot = Some(snapshot);
                self.mark_dirty();
            }
            UiUpdate::Log(update) => self.apply_log(update),
        }
    }

    /// Handle an app event.
    pub async fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SelectPrev => self.select(self.selected.saturating_sub(1)).await,
            AppEvent::SelectNext => self.select(self.selected + 1).await,
            AppEvent::SelectFirst => self.select(0).await,
            AppEvent::SelectLast => self.select(self.services.len().saturating_sub(1)).await,

            AppEvent::LogTop => self.scroll_log(LogPane::scroll_top),
            AppEvent::LogBottom => self.scroll_log(LogPane::scroll_bottom),
            AppEvent::LogPageUp => self.scroll_log(LogPane::page_up),
            AppEvent::LogPageDown => self.scroll_log(LogPane::page_down),

            AppEvent::ToggleLog => {
                if self.log_visible {
                    self.close_log().await;
                } else {
                    self.open_log().await;
                }
            }
            AppEvent::Control(action) => {
                self.dispatcher.dispatch(self.selected_service(), action);
            }

            AppEvent::ToggleHelp => self.set_help(!self.show_help),
            AppEvent::CloseHelp => self.set_help(false),
            AppEvent::Redraw => {
                self.clear_requested = true;
                self.mark_dirty();
            }
            AppEvent::Quit => {
                info!("quit requested");
                self.should_quit = true;
            }
            AppEvent::None => {}
        }
    }

    fn set_help(&mut self, visible: bool) {
        self.show_help = visible;
        self.input_handler.set_help_mode(visible);
        self.mark_dirty();
    }

    /// Move the selection, following with the log panel when it is open.
    async fn select(&mut self, index: usize) {
        if self.services.is_empty() {
            return;
        }
        let index = index.min(self.services.len() - 1);
        if index == self.selected {
            return;
        }
        self.selected = index;
        self.mark_dirty();
        if self.log_visible {
            self.open_log().await;
        }
    }

    fn scroll_log(&mut self, scroll: fn(&mut LogPane)) {
        if self.log_visible {
            scroll(&mut self.log_pane);
            self.mark_dirty();
        }
    }

    async fn open_log(&mut self) {
        let Some(service) = self.selected_service().cloned() else {
            debug!("no service selected, not opening log");
            return;
        };
        self.log_pane.reset();
        self.log_visible = true;
        self.log_tail.open(service).await;
        self.mark_dirty();
    }

    async fn close_log(&mut self) {
        self.log_tail.close().await;
        self.log_pane.reset();
        self.log_visible = false;
        self.mark_dirty();
    }

    fn apply_log(&mut self, update: LogUpdate) {
        if !self.log_tail.accept(&update) {
            trace!(session = update.session, "dropping update from retired log session");
            return;
        }
        match update.event {
            TailEvent::Opened => self.log_pane.begin_burst(),
            TailEvent::Line(line) => self.log_pane.push_line(&line),
            TailEvent::OpenFailed(message) => {
                self.log_pane.set_error(format!("Error opening log: {message}"));
            }
            TailEvent::Settled => self.log_pane.settle(),
            TailEvent::Closed(Some(message)) => {
                self.log_pane.set_error(format!("Log stopped: {message}"));
            }
            TailEvent::Closed(None) => self.log_pane.end(),
        }
        self.mark_dirty();
    }

    async fn handle_mouse(&mut self, mouse: MouseEvent) {
        let at = Position::new(mouse.column, mouse.row);
        let over_log = self.log_visible && self.log_area.contains(at);

        match mouse.kind {
            MouseEventKind::ScrollUp if over_log => {
                self.log_pane.scroll_up(MOUSE_SCROLL_LINES);
                self.mark_dirty();
            }
            MouseEventKind::ScrollDown if over_log => {
                self.log_pane.scroll_down(MOUSE_SCROLL_LINES);
                self.mark_dirty();
            }
            MouseEventKind::ScrollUp => self.handle_app_event(AppEvent::SelectPrev).await,
            MouseEventKind::ScrollDown => self.handle_app_event(AppEvent::SelectNext).await,
            MouseEventKind::Down(MouseButton::Left) if self.list_area.contains(at) => {
                // First row sits under the top border
                if let Some(row) = mouse.row.checked_sub(self.list_area.y + 1) {
                    let index = self.list_state.offset() + row as usize;
                    if index < self.services.len() {
                        self.select(index).await;
                    }
                }
            }
            _ => {}
        }
    }

    /// Run the application until the user quits.
    pub async fn run(&mut self) -> AppResult<()> {
        let mut terminal = init_terminal()?;
        let input = match InputReader::spawn(self.tx.clone()) {
            Ok(input) => input,
            Err(e) => {
                let _ = restore_terminal(&mut terminal);
                return Err(e.into());
            }
        };
        let poller = self.poller.take().map(|p| p.spawn(self.tx.clone()));

        let result = self.run_loop(&mut terminal).await;

        input.stop();
        self.log_tail.close().await;
        if let Some(poller) = poller {
            poller.shutdown().await;
        }
        restore_terminal(&mut terminal)?;
        result
    }

    /// The inner event loop.
    async fn run_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> AppResult<()> {
        terminal.draw(|frame| self.draw(frame))?;

        while !self.should_quit {
            let Some(update) = self.rx.recv().await else {
                break;
            };
            self.apply(update).await;
            self.apply_queued(MAX_UPDATES_PER_FRAME - 1).await;

            if self.take_clear() {
                terminal.clear()?;
            }
            if self.take_dirty() {
                terminal.draw(|frame| self.draw(frame))?;
            }
        }
        Ok(())
    }

    /// Apply up to `limit` updates that are already queued, without waiting.
    /// Returns how many were applied.
    async fn apply_queued(&mut self, limit: usize) -> usize {
        let mut applied = 0;
        while !self.should_quit && applied < limit {
            let Ok(update) = self.rx.try_recv() else {
                break;
            };
            self.apply(update).await;
            applied += 1;
        }
        applied
    }

    /// Draw the UI.
    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let [main, footer] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);

        if self.log_visible {
            let [list, log] =
                Layout::horizontal([Constraint::Ratio(1, 4), Constraint::Ratio(3, 4)]).areas(main);
            self.draw_services(frame, list);
            self.draw_log(frame, log);
        } else {
            self.draw_services(frame, main);
            self.log_area = Rect::default();
        }
        self.draw_footer(frame, footer);

        if self.show_help {
            self.draw_help_overlay(frame, area);
        }
    }

    fn draw_services(&mut self, frame: &mut Frame, area: Rect) {
        self.list_area = area;

        let mut block = Block::default()
            .borders(Borders::ALL)
            .title(" Services ");
        if let Some(Ok(record)) = self.selected_outcome() {
            block = block.title_bottom(format!(" {} ", view::status_details(record)));
        }

        if self.services.is_empty() {
            let empty = Paragraph::new(Line::styled("no services found", Style::default().fg(GRAY)))
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem> = self
            .services
            .iter()
            .enumerate()
            .map(|(i, service)| {
                let outcome = self.snapshot.as_ref().and_then(|s| s.get(i));
                ListItem::new(view::status_line(service.name(), outcome))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::Gray));
        self.list_state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn draw_log(&mut self, frame: &mut Frame, area: Rect) {
        self.log_area = area;

        let name = self.log_tail.service().map(ServiceRef::name).unwrap_or_default();
        let title = match self.log_pane.buffer().dropped_count() {
            0 => format!(" {name} (log) "),
            dropped => format!(" {name} (log, {dropped} older lines dropped) "),
        };
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);

        let error_rows = usize::from(self.log_pane.error().is_some());
        self.log_pane
            .set_page((inner.height as usize).saturating_sub(error_rows));

        let mut lines: Vec<Line> = self.log_pane.visible().map(view::log_line).collect();
        if let Some(error) = self.log_pane.error() {
            lines.push(Line::styled(error, Style::default().fg(RED)));
        }
        frame.render_widget(Paragraph::new(lines).block(block), area);

        if self.log_pane.is_loading() {
            let overlay = centered(inner, 14, 3);
            frame.render_widget(Clear, overlay);
            frame.render_widget(
                Paragraph::new("Loading…")
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL)),
                overlay,
            );
        }
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let footer = Paragraph::new(Line::styled("?: Help", Style::default().fg(GREEN)))
            .alignment(Alignment::Center);
        frame.render_widget(footer, area);
    }

    /// Draw the help overlay.
    fn draw_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let height = HELP_TEXT.lines().count() as u16 + 2;
        let overlay_area = centered(area, HELP_WIDTH, height);

        // Clear background
        frame.render_widget(Clear, overlay_area);

        let help = Paragraph::new(HELP_TEXT).block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(
                    " Help ",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ))
                .style(Style::default().bg(Color::Blue)),
        );
        frame.render_widget(help, overlay_area);
    }
}

/// A `width` x `height` rectangle centred in `area`, shrunk to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Switch the terminal to raw mode on the alternate screen.
fn init_terminal() -> s6dash_core::Result<Terminal<CrosstermBackend<Stdout>>> {
    let init = |e: io::Error| DashError::TerminalInit {
        message: e.to_string(),
    };
    crossterm::terminal::enable_raw_mode().map_err(init)?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )
    .map_err(init)?;
    Terminal::new(CrosstermBackend::new(stdout)).map_err(init)
}

/// Undo [`init_terminal`].
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> s6dash_core::Result<()> {
    let restore = |e: io::Error| DashError::TerminalRestore {
        message: e.to_string(),
    };
    crossterm::terminal::disable_raw_mode().map_err(restore)?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )
    .map_err(restore)?;
    terminal.show_cursor().map_err(restore)
}
