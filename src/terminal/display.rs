//! Display surface the session writes into.
//!
//! [`TerminalDisplay`] is the collaborator seam: anything with xterm-like
//! `write`/`reset`/`clear`, a scroll buffer and dimensions can back a
//! session. Writes that the reconciler must wait on are issued through
//! [`TerminalDisplay::write_with_ack`]; the display reports them back via
//! [`TerminalDisplay::take_completed_writes`] whenever it has finished, which
//! may be immediately or much later.
//!
//! [`Vt100Display`] is the in-crate implementation, backed by a `vt100`
//! parser and rendered to the host terminal as state diffs.

// Rust guideline compliant 2026-02

use std::panic::{catch_unwind, AssertUnwindSafe};

use vt100::Parser;

use crate::constants::{MIN_DISPLAY_ROWS, SCROLLBACK_LINES};

/// Identifies a write whose completion the session waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriteToken(pub u64);

impl std::fmt::Display for WriteToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "write#{}", self.0)
    }
}

/// Scroll buffer geometry, in xterm terms.
///
/// `base_y` is the line index of the top of the live screen (equal to the
/// number of scrollback lines); `viewport_y` is the line index at the top
/// of what the viewer currently sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollPosition {
    /// First line of the live screen.
    pub base_y: usize,
    /// First visible line.
    pub viewport_y: usize,
}

impl ScrollPosition {
    /// Whether the viewer is following live output.
    #[must_use]
    pub fn is_at_bottom(self) -> bool {
        self.viewport_y == self.base_y
    }
}

/// CUP sequence moving the cursor to zero-based column `x`, row `y`.
#[must_use]
pub fn cursor_to(x: u16, y: u16) -> String {
    format!("\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// A terminal-emulator surface.
pub trait TerminalDisplay {
    /// Write output immediately.
    fn write(&mut self, data: &str);

    /// Write output and report `token` through
    /// [`take_completed_writes`](Self::take_completed_writes) once done.
    fn write_with_ack(&mut self, data: &str, token: WriteToken);

    /// Tokens of acknowledged writes completed since the last call.
    fn take_completed_writes(&mut self) -> Vec<WriteToken>;

    /// Live-output path. Implementations may batch; the default writes
    /// straight through.
    fn enqueue(&mut self, data: &str) {
        self.write(data);
    }

    /// Full terminal reset.
    fn reset(&mut self);

    /// Clear the screen and scrollback.
    fn clear(&mut self);

    /// Scroll so that buffer line `line` is at the top of the viewport.
    fn scroll_to_line(&mut self, line: usize);

    /// Current scroll geometry.
    fn scroll_position(&mut self) -> ScrollPosition;

    /// Scrollback depth in lines.
    fn set_scrollback(&mut self, lines: usize);

    /// Width in columns.
    fn cols(&self) -> u16;

    /// Height in rows.
    fn rows(&self) -> u16;

    /// Whether the display has usable dimensions.
    fn is_ready(&self) -> bool {
        self.cols() > 0 && self.rows() > 0
    }
}

/// `vt100`-backed display.
///
/// Writes are processed synchronously, so acknowledged writes complete as
/// soon as they are issued; the driver still observes them only when it
/// drains completions, after its current message.
///
/// The viewer's offset from the bottom is tracked here rather than in the
/// parser. `vt100` can only show up to one screen of scrollback above the
/// live rows, so the parser is handed at most `rows` of the offset while
/// [`scroll_position`](TerminalDisplay::scroll_position) reports the full
/// depth.
pub struct Vt100Display {
    parser: Parser,
    scrollback: usize,
    view_offset: usize,
    completed: Vec<WriteToken>,
    rendered: Option<vt100::Screen>,
}

impl std::fmt::Debug for Vt100Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vt100Display")
            .field("size", &self.parser.screen().size())
            .field("scrollback", &self.scrollback)
            .field("view_offset", &self.view_offset)
            .field("completed", &self.completed.len())
            .finish_non_exhaustive()
    }
}

impl Vt100Display {
    /// Create an empty display.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self::with_scrollback(rows, cols, SCROLLBACK_LINES)
    }

    /// Create an empty display with an explicit scrollback depth.
    #[must_use]
    pub fn with_scrollback(rows: u16, cols: u16, scrollback: usize) -> Self {
        Self {
            parser: Parser::new(rows, cols, scrollback),
            scrollback,
            view_offset: 0,
            completed: Vec::new(),
            rendered: None,
        }
    }

    /// The screen, for rendering or inspection.
    #[must_use]
    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    /// Plain-text contents of the visible screen.
    #[must_use]
    pub fn contents(&self) -> String {
        self.parser.screen().contents()
    }

    /// Resize the emulator.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let rows = rows.max(MIN_DISPLAY_ROWS);
        self.parser.set_size(rows, cols);
        self.sync_view();
    }

    /// Bytes that bring the host terminal from the last rendered state to
    /// the current one. The first call returns the full state.
    pub fn render_diff(&mut self) -> Vec<u8> {
        let screen = self.parser.screen().clone();
        let out = match &self.rendered {
            Some(previous) => screen.state_diff(previous),
            None => screen.state_formatted(),
        };
        self.rendered = Some(screen);
        out
    }

    /// Force the next [`render_diff`](Self::render_diff) to emit full state.
    pub fn invalidate_render(&mut self) {
        self.rendered = None;
    }

    fn fresh_parser(&self) -> Parser {
        let (rows, cols) = self.parser.screen().size();
        Parser::new(rows.max(MIN_DISPLAY_ROWS), cols, self.scrollback)
    }

    fn replace_parser(&mut self, parser: Parser) {
        self.parser = parser;
        self.view_offset = 0;
    }

    /// Lines currently held in scrollback.
    fn depth(&mut self) -> usize {
        self.parser.set_scrollback(usize::MAX);
        let depth = self.parser.screen().scrollback();
        self.sync_view();
        depth
    }

    /// Hand the parser as much of the view offset as it can render.
    fn sync_view(&mut self) {
        let rows = usize::from(self.parser.screen().size().0);
        self.parser.set_scrollback(self.view_offset.min(rows));
    }

    fn process(&mut self, data: &[u8]) {
        let before = if self.view_offset > 0 { self.depth() } else { 0 };

        // vt100 grows a non-zero offset as lines scroll in; keep it at
        // zero while processing and account for growth here.
        self.parser.set_scrollback(0);
        let parser = &mut self.parser;
        let result = catch_unwind(AssertUnwindSafe(|| parser.process(data)));

        if let Err(panic_info) = result {
            let msg = panic_info
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| panic_info.downcast_ref::<&str>().copied())
                .unwrap_or("unknown panic");
            let fresh = self.fresh_parser();
            self.replace_parser(fresh);
            let (rows, cols) = self.parser.screen().size();
            log::error!("[Display] vt100 parser panicked (reset {rows}x{cols}): {msg}");
            return;
        }

        if self.view_offset > 0 {
            let after = self.depth();
            self.view_offset = (self.view_offset + after.saturating_sub(before)).min(after);
        }
        self.sync_view();
    }
}

impl TerminalDisplay for Vt100Display {
    fn write(&mut self, data: &str) {
        self.process(data.as_bytes());
    }

    fn write_with_ack(&mut self, data: &str, token: WriteToken) {
        self.process(data.as_bytes());
        self.completed.push(token);
    }

    fn take_completed_writes(&mut self) -> Vec<WriteToken> {
        std::mem::take(&mut self.completed)
    }

    fn reset(&mut self) {
        // A fresh parser is the only way to drop vt100's scrollback; RIS
        // leaves it intact.
        let fresh = self.fresh_parser();
        self.replace_parser(fresh);
    }

    fn clear(&mut self) {
        self.process(b"\x1b[H\x1b[2J");
        let visible = self.parser.screen().contents_formatted();
        let mut fresh = self.fresh_parser();
        fresh.process(&visible);
        self.replace_parser(fresh);
    }

    fn scroll_to_line(&mut self, line: usize) {
        let depth = self.depth();
        self.view_offset = depth - line.min(depth);
        self.sync_view();
    }

    fn scroll_position(&mut self) -> ScrollPosition {
        let depth = self.depth();
        let offset = self.view_offset.min(depth);
        ScrollPosition {
            base_y: depth,
            viewport_y: depth - offset,
        }
    }

    fn set_scrollback(&mut self, lines: usize) {
        // vt100 fixes the scrollback length at construction; the new depth
        // applies from the next reset.
        self.scrollback = lines;
    }

    fn cols(&self) -> u16 {
        self.parser.screen().size().1
    }

    fn rows(&self) -> u16 {
        self.parser.screen().size().0
    }
}
