//! Presentation helpers: status rows, log lines, and the log panel model.
//!
//! Nothing here touches the terminal. [`crate::app::App`] turns these into
//! widgets when drawing.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::time::Duration;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use s6dash_core::{StatusOutcome, StatusRecord};

/// Default number of log lines kept.
pub const DEFAULT_LOG_CAPACITY: usize = 50_000;

pub const GREEN: Color = Color::Green;
pub const RED: Color = Color::Red;
pub const ORANGE: Color = Color::Rgb(255, 165, 0);
pub const GRAY: Color = Color::DarkGray;

/// How a service row is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    /// Not polled yet
    Pending,
    /// The status query failed
    Error,
    /// Running as wanted
    UpWanted,
    /// Running but wanted down
    UpUnwanted,
    /// Down but wanted up
    DownWanted,
    /// Down as wanted
    DownUnwanted,
}

impl StatusMarker {
    /// Glyph and colour for the marker column.
    pub fn glyph(self) -> (&'static str, Style) {
        match self {
            Self::Pending => (" ", Style::default()),
            Self::Error => ("×", Style::default().fg(RED)),
            Self::UpWanted => ("↑", Style::default().fg(GREEN)),
            Self::UpUnwanted => ("↑", Style::default().fg(ORANGE)),
            Self::DownWanted => ("↓", Style::default().fg(RED)),
            Self::DownUnwanted => ("↓", Style::default().fg(GRAY)),
        }
    }
}

/// Pick the marker for a row.
pub fn classify(outcome: Option<&StatusOutcome>) -> StatusMarker {
    match outcome {
        None => StatusMarker::Pending,
        Some(Err(_)) => StatusMarker::Error,
        Some(Ok(s)) => match (s.up, s.wanted_up) {
            (true, true) => StatusMarker::UpWanted,
            (true, false) => StatusMarker::UpUnwanted,
            (false, true) => StatusMarker::DownWanted,
            (false, false) => StatusMarker::DownUnwanted,
        },
    }
}

/// One row of the services list.
///
/// Layout: marker, space, ready glyph, space, name, then error or exit
/// details in red where they apply.
pub fn status_line(name: &str, outcome: Option<&StatusOutcome>) -> Line<'static> {
    let marker = classify(outcome);
    let (glyph, style) = marker.glyph();
    let ready = matches!(outcome, Some(Ok(s)) if s.ready);

    let mut spans = vec![
        Span::styled(glyph, style),
        Span::raw(" "),
        if ready {
            Span::styled("✓", Style::default().fg(GREEN))
        } else {
            Span::raw(" ")
        },
        Span::raw(" "),
        Span::raw(name.to_string()),
    ];

    let red = Style::default().fg(RED);
    match outcome {
        Some(Err(message)) => {
            spans.push(Span::raw(" - "));
            spans.push(Span::styled(format!("error: {message}"), red));
        }
        Some(Ok(s)) if marker == StatusMarker::DownWanted => {
            spans.push(Span::raw(" - "));
            spans.push(Span::styled(
                format!("exitcode: {} - signal: {}", s.exit_code, s.signal),
                red,
            ));
        }
        _ => {}
    }
    Line::from(spans)
}

/// Short summary of a record for the list's bottom title.
pub fn status_details(record: &StatusRecord) -> String {
    if record.up {
        let mut text = format!(
            "pid: {} - up: {}",
            record.pid,
            format_duration(record.up_for)
        );
        if record.ready {
            text.push_str(&format!(" - ready: {}", format_duration(record.ready_for)));
        }
        text
    } else {
        format!("down: {}", format_duration(record.up_for))
    }
}

/// Human duration with the two most significant units, e.g. `1h 5m`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (days, hours, mins, secs) = (
        secs / 86_400,
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    );
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Remove terminal escape sequences: colours, cursor movement, OSC titles
/// and hyperlinks, and charset selection such as `tput sgr0`'s `ESC ( B`.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }
    let cleaned = strip_ansi_escapes::strip(text);
    Cow::Owned(String::from_utf8_lossy(&cleaned).into_owned())
}

/// Length in bytes of a leading timestamp, if the line starts with one.
///
/// Recognizes TAI64N labels (`@` and 24 hex digits) and ISO times of the
/// form `YYYY-MM-DD HH:MM:SS.fraction` (a `T` separator is accepted too).
pub fn timestamp_prefix_len(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();

    if bytes.first() == Some(&b'@')
        && bytes.len() >= 25
        && bytes[1..25].iter().all(u8::is_ascii_hexdigit)
    {
        return Some(25);
    }

    const ISO: &[u8] = b"dddd-dd-dd dd:dd:dd.";
    if bytes.len() <= ISO.len() {
        return None;
    }
    let matches = ISO.iter().zip(bytes).all(|(pattern, b)| match pattern {
        b'd' => b.is_ascii_digit(),
        b' ' => *b == b' ' || *b == b'T',
        other => b == other,
    });
    if !matches {
        return None;
    }
    let fraction = bytes[ISO.len()..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    (fraction > 0).then_some(ISO.len() + fraction)
}

/// A log line with its timestamp prefix greyed out.
pub fn log_line(text: &str) -> Line<'_> {
    match timestamp_prefix_len(text) {
        Some(n) => Line::from(vec![
            Span::styled(&text[..n], Style::default().fg(GRAY)),
            Span::raw(&text[n..]),
        ]),
        None => Line::raw(text),
    }
}

/// Ring buffer of log lines. The oldest line goes when it is full.
#[derive(Debug)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    /// Lines dropped due to capacity limits
    dropped_count: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(10_000)),
            capacity: capacity.max(1),
            dropped_count: 0,
        }
    }

    /// Append a line, stripping escape sequences. Returns `true` if the
    /// oldest line was dropped to make room.
    pub fn push(&mut self, line: &str) -> bool {
        let dropped = self.lines.len() >= self.capacity;
        if dropped {
            self.lines.pop_front();
            self.dropped_count += 1;
        }
        self.lines.push_back(strip_ansi(line).into_owned());
        dropped
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped_count
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.dropped_count = 0;
    }

    /// Up to `count` lines starting at `start`.
    pub fn range(&self, start: usize, count: usize) -> impl Iterator<Item = &str> {
        self.lines.iter().skip(start).take(count).map(String::as_str)
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Contents and scroll position of the log panel.
#[derive(Debug, Default)]
pub struct LogPane {
    buffer: LogBuffer,
    /// First visible line while not following
    offset: usize,
    follow: bool,
    loading: bool,
    error: Option<String>,
    /// Visible rows at the last draw
    page: usize,
}

impl LogPane {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: LogBuffer::new(capacity),
            offset: 0,
            follow: false,
            loading: false,
            error: None,
            page: 0,
        }
    }

    /// Empty the panel for a new session.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.offset = 0;
        self.follow = false;
        self.loading = false;
        self.error = None;
    }

    /// Replay started: show the loading box and hold the view at the top.
    pub fn begin_burst(&mut self) {
        self.loading = true;
        self.follow = false;
        self.offset = 0;
    }

    /// Replay finished: jump to the end and follow.
    pub fn settle(&mut self) {
        self.loading = false;
        self.follow = true;
    }

    /// The stream ended. Keep the text where it is and drop the loading box.
    pub fn end(&mut self) {
        self.loading = false;
    }

    /// Show an error line under the log text.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    pub fn push_line(&mut self, line: &str) {
        if self.buffer.push(line) && !self.follow {
            // Keep the same text on screen as the front shifts away
            self.offset = self.offset.saturating_sub(1);
        }
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Record the number of text rows the panel can show.
    pub fn set_page(&mut self, rows: usize) {
        self.page = rows;
    }

    fn page(&self) -> usize {
        self.page.max(1)
    }

    fn max_top(&self) -> usize {
        self.buffer.len().saturating_sub(self.page())
    }

    /// Index of the first visible line.
    pub fn top(&self) -> usize {
        if self.follow {
            self.max_top()
        } else {
            self.offset.min(self.max_top())
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.buffer.range(self.top(), self.page())
    }

    pub fn scroll_top(&mut self) {
        self.follow = false;
        self.offset = 0;
    }

    pub fn scroll_bottom(&mut self) {
        self.follow = true;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let top = self.top();
        self.follow = false;
        self.offset = top.saturating_sub(lines);
    }

    /// Scrolling to or past the last page switches to follow mode.
    pub fn scroll_down(&mut self, lines: usize) {
        let top = self.top() + lines;
        if top >= self.max_top() {
            self.follow = true;
        } else {
            self.offset = top;
        }
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.page());
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.page());
    }
}
