//! Terminal stream reconciliation.
//!
//! A [`TerminalSession`] keeps one display consistent with a remote
//! terminal's output stream across attach, reconnect and history reloads.
//! It owns every piece of per-session state; handlers for each concern
//! live in their own file as `impl` blocks on the session:
//!
//! - [`subscription`]: subscribe/resubscribe and focus
//! - [`seed`]: chunked first-attach seed
//! - [`live`]: per-frame routing
//! - [`history`]: snapshot apply and merge
//!
//! All handlers run sequentially on the caller's task. Interleaving of
//! live frames with an outstanding fetch or write is handled by the
//! session [`phase`], never by locks.
//!
//! # Example
//!
//! ```ignore
//! let mut session = TerminalSession::new("s1", Vt100Display::new(24, 80), TerminalConfig::default());
//! session.attempt_subscription(&mut channel)?;
//! while let Some(envelope) = next_envelope().await {
//!     session.handle_envelope(&envelope, &mut channel);
//!     session.poll_write_completions();
//! }
//! ```

// Rust guideline compliant 2026-02

pub mod display;
pub mod error;
pub mod history;
pub mod live;
pub mod messages;
pub mod overflow;
pub mod phase;
pub mod seed;
pub mod sequence;
pub mod subscription;

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::{Channel, Envelope, Route};
use crate::constants::SCROLLBACK_LINES;

pub use display::{cursor_to, ScrollPosition, TerminalDisplay, Vt100Display, WriteToken};
pub use error::HandlerError;
pub use history::{BufferedFrame, HistoryOutcome};
pub use messages::{DataPayload, SessionStatus, StateChangePayload};
pub use overflow::{BoundedBuffer, BufferLimits};
pub use phase::{FrameDisposition, PhaseEvent, SessionPhase};
pub use seed::SeedPolicy;
pub use sequence::SequencePolicy;
pub use subscription::{SubscribeAttempt, SubscribeBlocked, SubscriptionState};

use history::HistoryState;
use messages::{kind, parse_payload};
use seed::{AssembledSeed, SeedAssembler, SeedProgress};
use sequence::SequenceTracker;
use subscription::Subscription;

/// Per-session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Scrollback depth enabled before a history write.
    pub scrollback_lines: usize,
    /// Thresholds for both reconciliation buffers.
    pub buffer_limits: BufferLimits,
    /// What to do with a completed seed.
    pub seed_policy: SeedPolicy,
    /// How live frames update the tracked sequence.
    pub sequence_policy: SequencePolicy,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            scrollback_lines: SCROLLBACK_LINES,
            buffer_limits: BufferLimits::default(),
            seed_policy: SeedPolicy::default(),
            sequence_policy: SequencePolicy::default(),
        }
    }
}

/// Outcome of [`TerminalSession::handle_envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler ran to completion.
    Handled,
    /// A handler failed; the error was logged.
    Failed,
    /// Not addressed to this session, or of an unknown type.
    Ignored,
}

type LifecycleCallback = Box<dyn FnMut(&StateChangePayload) + Send>;

/// Reconciliation state for one mounted display.
pub struct TerminalSession<D: TerminalDisplay> {
    session_id: String,
    display: D,
    config: TerminalConfig,
    phase: SessionPhase,
    subscription: Subscription,
    sequence: SequenceTracker,
    seed: SeedAssembler,
    history: HistoryState,
    in_flight: BoundedBuffer<BufferedFrame>,
    pending_writes: BoundedBuffer<String>,
    has_more_history: bool,
    is_authority: bool,
    on_lifecycle: Option<LifecycleCallback>,
}

impl<D: TerminalDisplay> std::fmt::Debug for TerminalSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("subscription", &self.subscription)
            .field("last_sequence", &self.sequence.current())
            .field("seed_assembling", &self.seed.is_assembling())
            .field("seed_chunks", &self.seed.received_count())
            .field("in_flight", &self.in_flight.len())
            .field("pending_writes", &self.pending_writes.len())
            .field("is_authority", &self.is_authority)
            .finish_non_exhaustive()
    }
}

impl<D: TerminalDisplay> TerminalSession<D> {
    /// Create a session for a freshly mounted display.
    pub fn new(session_id: impl Into<String>, display: D, config: TerminalConfig) -> Self {
        Self {
            session_id: session_id.into(),
            display,
            phase: SessionPhase::Idle,
            subscription: Subscription::default(),
            sequence: SequenceTracker::new(config.sequence_policy),
            seed: SeedAssembler::new(),
            history: HistoryState::default(),
            in_flight: BoundedBuffer::new(config.buffer_limits),
            pending_writes: BoundedBuffer::new(config.buffer_limits),
            has_more_history: false,
            is_authority: false,
            on_lifecycle: None,
            config,
        }
    }

    /// Register the observer for `ended`/`crashed`/`timeout` transitions.
    pub fn on_lifecycle(&mut self, callback: impl FnMut(&StateChangePayload) + Send + 'static) {
        self.on_lifecycle = Some(Box::new(callback));
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Session key.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The display.
    pub fn display(&self) -> &D {
        &self.display
    }

    /// The display, mutably (resize, render).
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Active tuning.
    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Last output sequence applied.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.current()
    }

    /// Subscription state.
    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscription.state()
    }

    /// Whether the remote acknowledged the subscription.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.state() == SubscriptionState::Subscribed
    }

    /// Whether any subscribe was sent for this display.
    pub fn has_ever_subscribed(&self) -> bool {
        self.subscription.has_ever_subscribed()
    }

    /// True while a first-attach seed is outstanding.
    pub fn expecting_seed(&self) -> bool {
        self.phase.expecting_seed()
    }

    /// Whether this client holds input focus.
    pub fn is_authority(&self) -> bool {
        self.is_authority
    }

    /// Whether older scrollback can be fetched.
    pub fn has_more_history(&self) -> bool {
        self.has_more_history
    }

    /// Capture point of the last applied snapshot.
    pub fn last_captured_sequence(&self) -> u64 {
        self.history.last_captured()
    }

    /// Frames held for the outstanding fetch.
    pub fn in_flight_frames(&self) -> impl Iterator<Item = &BufferedFrame> {
        self.in_flight.iter()
    }

    /// Number of frames held for the outstanding fetch.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of writes held for the active snapshot write.
    pub fn pending_write_len(&self) -> usize {
        self.pending_writes.len()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Route one inbound envelope to its handler.
    ///
    /// Handler errors and panics are logged and swallowed; one bad message
    /// never stops the session.
    pub fn handle_envelope(&mut self, envelope: &Envelope, channel: &mut dyn Channel) -> Dispatch {
        let payload = &envelope.payload;
        let kind = envelope.kind.as_str();

        match envelope.route() {
            Route::Terminal(id) if id == self.session_id => match kind {
                kind::SUBSCRIBED => self.guard(kind::SUBSCRIBED, |s| {
                    s.handle_subscribed(parse_payload(kind::SUBSCRIBED, payload)?);
                    Ok(())
                }),
                kind::SEED_ANSI => self.guard(kind::SEED_ANSI, |s| {
                    s.handle_seed_chunk(parse_payload(kind::SEED_ANSI, payload)?)
                }),
                kind::DATA => self.guard(kind::DATA, |s| {
                    s.handle_data(parse_payload(kind::DATA, payload)?);
                    Ok(())
                }),
                kind::FULL_HISTORY => self.guard(kind::FULL_HISTORY, |s| {
                    s.handle_full_history(parse_payload(kind::FULL_HISTORY, payload)?);
                    Ok(())
                }),
                kind::FOCUS_CHANGED => self.guard(kind::FOCUS_CHANGED, |s| {
                    s.handle_focus_changed(parse_payload(kind::FOCUS_CHANGED, payload)?, channel);
                    Ok(())
                }),
                other => {
                    log::debug!("[Terminal] {}: unknown terminal message '{other}'", self.session_id);
                    Dispatch::Ignored
                }
            },
            Route::Session(id) if id == self.session_id && kind == kind::STATE_CHANGE => self
                .guard(kind::STATE_CHANGE, |s| {
                    s.handle_state_change(parse_payload(kind::STATE_CHANGE, payload)?);
                    Ok(())
                }),
            Route::System if kind == kind::PING => {
                self.guard(kind::PING, |_| {
                    channel
                        .emit(messages::event::PONG, Value::Null)
                        .map_err(HandlerError::from)
                })
            }
            _ => {
                log::trace!("[Terminal] ignoring {} {}", envelope.topic, kind);
                Dispatch::Ignored
            }
        }
    }

    fn guard(
        &mut self,
        handler: &'static str,
        f: impl FnOnce(&mut Self) -> Result<(), HandlerError>,
    ) -> Dispatch {
        match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(())) => Dispatch::Handled,
            Ok(Err(e @ (HandlerError::MalformedPayload { .. } | HandlerError::InvalidChunk { .. }))) => {
                log::warn!("[Terminal] {}: dropped {handler}: {e}", self.session_id);
                Dispatch::Failed
            }
            Ok(Err(e)) => {
                log::error!("[Terminal] {}: {handler} handler failed: {e}", self.session_id);
                Dispatch::Failed
            }
            Err(panic_info) => {
                let msg = panic_info
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic_info.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                log::error!("[Terminal] {}: {handler} handler panicked: {msg}", self.session_id);
                Dispatch::Failed
            }
        }
    }

    fn transition(&mut self, event: PhaseEvent) {
        let next = self.phase.next(event);
        if next != self.phase {
            log::debug!(
                "[Terminal] {}: {} -> {} ({event:?})",
                self.session_id,
                self.phase.name(),
                next.name()
            );
            self.phase = next;
        }
    }

    // ------------------------------------------------------------------
    // Seed
    // ------------------------------------------------------------------

    /// Accept one `seed_ansi` chunk.
    ///
    /// Chunks outside the seed phase are ignored. A malformed chunk is
    /// rejected without disturbing the chunks already received.
    pub fn handle_seed_chunk(
        &mut self,
        payload: messages::SeedChunkPayload,
    ) -> Result<(), HandlerError> {
        if let Some(more) = payload.has_history {
            self.has_more_history = more;
        }
        if !self.phase.expecting_seed() {
            log::debug!(
                "[Seed] {}: chunk outside seed phase ({})",
                self.session_id,
                self.phase.name()
            );
            return Ok(());
        }

        match self.seed.accept(payload)? {
            SeedProgress::Pending { received, total } => {
                log::trace!("[Seed] {}: {received}/{total} chunks", self.session_id);
            }
            SeedProgress::Complete(seed) => {
                self.apply_seed(seed);
                self.transition(PhaseEvent::SeedCompleted);
            }
        }
        Ok(())
    }

    fn apply_seed(&mut self, seed: AssembledSeed) {
        match self.config.seed_policy {
            SeedPolicy::Discard => {
                log::debug!(
                    "[Seed] {}: assembled {} bytes, discarded",
                    self.session_id,
                    seed.payload.len()
                );
            }
            SeedPolicy::Render => {
                log::debug!(
                    "[Seed] {}: rendering {} bytes ({:?}x{:?})",
                    self.session_id,
                    seed.payload.len(),
                    seed.cols,
                    seed.rows
                );
                self.display.reset();
                self.display.clear();
                self.display.write(&seed.payload);
                if let Some((x, y)) = seed.cursor {
                    self.display.write(&cursor_to(x, y));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Apply a `session/<id>` `state_change`.
    pub fn handle_state_change(&mut self, payload: StateChangePayload) {
        log::info!(
            "[Terminal] {}: remote status {:?}{}",
            self.session_id,
            payload.status,
            payload
                .message
                .as_deref()
                .map(|m| format!(" ({m})"))
                .unwrap_or_default()
        );

        if let Some(notice) = session_notice(&payload) {
            self.handle_data(DataPayload::unsequenced(notice));
        }

        if payload.status.is_terminal() {
            if let Some(callback) = self.on_lifecycle.as_mut() {
                callback(&payload);
            }
        }
    }

    /// Unmount: drop all buffered state and return to [`SessionPhase::Idle`].
    pub fn detach(&mut self) {
        let dropped = self.in_flight.clear() + self.pending_writes.clear();
        if dropped > 0 {
            log::debug!("[Terminal] {}: detach dropped {dropped} buffered frames", self.session_id);
        }
        self.seed.reset();
        self.history.forget_anchor();
        self.subscription = Subscription::default();
        self.is_authority = false;
        self.transition(PhaseEvent::Detached);
    }
}

/// Inline notice shown when the remote process stops.
fn session_notice(payload: &StateChangePayload) -> Option<String> {
    match payload.status {
        SessionStatus::Ended => Some("\r\n\x1b[2m[session ended]\x1b[0m\r\n".to_string()),
        SessionStatus::Crashed => Some(match payload.message.as_deref() {
            Some(message) => format!("\r\n\x1b[31m[session crashed: {message}]\x1b[0m\r\n"),
            None => "\r\n\x1b[31m[session crashed]\x1b[0m\r\n".to_string(),
        }),
        SessionStatus::Started | SessionStatus::Timeout => None,
    }
}
