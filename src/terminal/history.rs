//! Full-history snapshots and their merge with live output.
//!
//! A snapshot is the remote's whole scrollback tagged with the sequence it
//! was captured at. Applying one resets the display, writes the snapshot,
//! and after the display acknowledges the write, replays only the buffered
//! live frames that are strictly newer than the capture point. Frames
//! buffered as plain pending writes during an unrequested snapshot write
//! are dropped; the snapshot already covers them.
//!
//! The viewer's scroll offset from the bottom is preserved across the
//! reload unless they were following live output.

// Rust guideline compliant 2026-02

use super::display::{cursor_to, WriteToken};
use super::messages::{event, non_negative, FullHistoryPayload};
use super::overflow::Weighted;
use super::phase::{PhaseEvent, SessionPhase};
use super::{ScrollPosition, TerminalDisplay, TerminalSession};
use crate::channel::Channel;

/// A live frame held while a snapshot is fetched or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedFrame {
    /// Output sequence; `None` for unsequenced frames, which always replay.
    pub sequence: Option<u64>,
    /// Raw output bytes.
    pub data: String,
}

impl BufferedFrame {
    /// Whether the frame is not already contained in a snapshot captured
    /// at `captured`.
    #[must_use]
    pub fn is_newer_than(&self, captured: u64) -> bool {
        match self.sequence {
            Some(seq) => seq > captured,
            None => true,
        }
    }
}

impl Weighted for BufferedFrame {
    fn weight(&self) -> usize {
        self.data.len()
    }
}

/// Frames that survive the merge with a snapshot captured at `captured`,
/// in arrival order.
pub fn replay_after(frames: Vec<BufferedFrame>, captured: u64) -> Vec<String> {
    frames
        .into_iter()
        .filter(|frame| frame.is_newer_than(captured))
        .map(|frame| frame.data)
        .collect()
}

/// What [`TerminalSession::handle_full_history`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// Nothing new; dropped.
    Skipped,
    /// No history bytes; buffers were reset.
    Empty,
    /// Written under this token; waiting for the display.
    Writing(WriteToken),
}

/// Viewer position saved before a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollAnchor {
    base_y: usize,
    viewport_y: usize,
}

impl ScrollAnchor {
    /// Save `position`.
    #[must_use]
    pub fn capture(position: ScrollPosition) -> Self {
        Self {
            base_y: position.base_y,
            viewport_y: position.viewport_y,
        }
    }

    /// Whether the viewer was following live output.
    #[must_use]
    pub fn was_at_bottom(self) -> bool {
        self.viewport_y == self.base_y
    }

    /// Line to scroll to once the buffer's bottom is at `new_base_y`, or
    /// `None` if the view should keep following output.
    #[must_use]
    pub fn restore_line(self, new_base_y: usize) -> Option<usize> {
        if self.was_at_bottom() {
            return None;
        }
        let offset_from_bottom = self.base_y.saturating_sub(self.viewport_y);
        Some(new_base_y.saturating_sub(offset_from_bottom))
    }
}

/// Per-session snapshot bookkeeping.
#[derive(Debug, Default)]
pub(super) struct HistoryState {
    last_captured: u64,
    anchor: Option<ScrollAnchor>,
    next_token: u64,
}

impl HistoryState {
    pub(super) fn last_captured(&self) -> u64 {
        self.last_captured
    }

    pub(super) fn forget_anchor(&mut self) {
        self.anchor = None;
    }

    fn issue_token(&mut self) -> WriteToken {
        self.next_token += 1;
        WriteToken(self.next_token)
    }
}

impl<D: TerminalDisplay> TerminalSession<D> {
    /// Apply a `full_history` snapshot.
    ///
    /// A snapshot arriving while another is being written supersedes it:
    /// the display is reset again, the new snapshot is written under a new
    /// token and the earlier write's completion is ignored. Frames held for
    /// a requested fetch are kept and filtered against the newer capture
    /// point. A capture-time cursor, when given, is restored right after
    /// the snapshot bytes.
    pub fn handle_full_history(&mut self, payload: FullHistoryPayload) -> HistoryOutcome {
        let captured = non_negative(payload.captured_sequence).unwrap_or(0);
        if let Some(more) = payload.has_history {
            self.has_more_history = more;
        }

        let first_load = self.history.last_captured == 0;
        let has_new_data = captured > self.history.last_captured;
        if !first_load && !has_new_data && self.in_flight.is_empty() {
            log::debug!(
                "[History] {}: snapshot at {captured} adds nothing (last {}), skipped",
                self.session_id,
                self.history.last_captured
            );
            self.transition(PhaseEvent::HistorySkipped);
            return HistoryOutcome::Skipped;
        }

        self.history.last_captured = captured;

        let history = payload.history.unwrap_or_default();
        if history.is_empty() {
            let dropped = self.in_flight.clear() + self.pending_writes.clear();
            log::debug!(
                "[History] {}: empty snapshot at {captured}, dropped {dropped} buffered",
                self.session_id
            );
            self.history.forget_anchor();
            self.transition(PhaseEvent::HistoryEmpty);
            return HistoryOutcome::Empty;
        }

        let solicited = matches!(
            self.phase,
            SessionPhase::HistoryInFlight
                | SessionPhase::HistoryWriting {
                    solicited: true,
                    ..
                }
        );
        if let SessionPhase::HistoryWriting { token, .. } = self.phase {
            let dropped = self.pending_writes.clear();
            log::info!(
                "[History] {}: snapshot at {captured} supersedes {token} ({dropped} pending dropped)",
                self.session_id
            );
        } else {
            self.history.anchor = Some(ScrollAnchor::capture(self.display.scroll_position()));
        }
        if self.phase.expecting_seed() {
            log::debug!("[History] {}: snapshot supersedes seed", self.session_id);
            self.seed.reset();
        }

        let token = self.history.issue_token();
        self.transition(PhaseEvent::HistoryWriteStarted {
            token,
            captured_sequence: captured,
            solicited,
        });

        self.display.set_scrollback(self.config.scrollback_lines);
        self.display.reset();
        self.display.clear();
        log::debug!(
            "[History] {}: writing {} bytes at {captured} as {token}",
            self.session_id,
            history.len()
        );
        self.display.write_with_ack(&history, token);
        if let Some((x, y)) = payload.cursor_x.zip(payload.cursor_y) {
            self.display.write(&cursor_to(x, y));
        }
        HistoryOutcome::Writing(token)
    }

    /// The display finished the write issued under `token`.
    ///
    /// Returns `false` for a token that is not the current snapshot write.
    pub fn handle_write_complete(&mut self, token: WriteToken) -> bool {
        let SessionPhase::HistoryWriting {
            token: active,
            captured_sequence,
            ..
        } = self.phase
        else {
            log::debug!("[History] {}: {token} completed outside a write", self.session_id);
            return false;
        };
        if active != token {
            log::debug!(
                "[History] {}: stale completion {token} (active {active})",
                self.session_id
            );
            return false;
        }

        let buffered = self.in_flight.drain();
        let total = buffered.len();
        let replay = replay_after(buffered, captured_sequence);
        for data in &replay {
            self.display.write(data);
        }

        if let Some(anchor) = self.history.anchor.take() {
            let position = self.display.scroll_position();
            if let Some(line) = anchor.restore_line(position.base_y) {
                self.display.scroll_to_line(line);
            }
        }

        let dropped = self.pending_writes.clear();
        log::debug!(
            "[History] {}: {token} done, replayed {}/{total} after {captured_sequence}, dropped {dropped} pending",
            self.session_id,
            replay.len()
        );
        self.transition(PhaseEvent::WriteCompleted(token));
        true
    }

    /// Collect completions reported by the display and apply them.
    ///
    /// Returns how many matched the active write.
    pub fn poll_write_completions(&mut self) -> usize {
        self.display
            .take_completed_writes()
            .into_iter()
            .filter(|token| self.handle_write_complete(*token))
            .count()
    }

    /// Ask the remote for a snapshot.
    ///
    /// Live frames are buffered from this call on. Refused when not
    /// subscribed or while a snapshot is already in progress.
    pub fn request_full_history(&mut self, channel: &mut dyn Channel) -> bool {
        if !self.is_subscribed() {
            log::debug!("[History] {}: request refused, not subscribed", self.session_id);
            return false;
        }
        if self.phase.is_history_active() {
            log::debug!(
                "[History] {}: request refused, {} in progress",
                self.session_id,
                self.phase.name()
            );
            return false;
        }

        if self.phase.expecting_seed() {
            self.seed.reset();
        }
        self.transition(PhaseEvent::HistoryRequested);

        if !self.emit_session_request(channel, event::REQUEST_HISTORY) {
            self.abandon_fetch();
            return false;
        }
        log::info!("[History] {}: requested full history", self.session_id);
        true
    }

    /// Scroll-to-top hook. Requests history only if more is available.
    pub fn on_scrolled_to_top(&mut self, channel: &mut dyn Channel) -> bool {
        if !self.has_more_history {
            return false;
        }
        self.request_full_history(channel)
    }

    /// Give up on an outstanding fetch, writing what was held for it.
    pub(super) fn abandon_fetch(&mut self) {
        let held = self.in_flight.drain();
        if !held.is_empty() {
            log::debug!(
                "[History] {}: fetch abandoned, flushing {} frames",
                self.session_id,
                held.len()
            );
        }
        for frame in held {
            self.display.enqueue(&frame.data);
        }
        self.transition(PhaseEvent::Disconnected);
    }
}
