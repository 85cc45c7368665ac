//! Subscribe, resubscribe and input focus.
//!
//! [`Subscription`] is the pure state machine
//! (`Unsubscribed -> SubscribeAttempted -> Subscribed`), plus the
//! "has this display ever subscribed" flag that separates a first attach
//! from a reconnect. The session methods below drive it against a channel.

// Rust guideline compliant 2026-02

use super::messages::{
    event, non_negative, FocusChangedPayload, SessionRequest, SubscribeRequest, SubscribedPayload,
};
use super::phase::PhaseEvent;
use super::{TerminalDisplay, TerminalSession};
use crate::channel::Channel;

/// Where the session is in the subscribe handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No subscription; an attempt may be made.
    #[default]
    Unsubscribed,
    /// Subscribe sent, acknowledgment not yet received.
    SubscribeAttempted,
    /// Remote acknowledged the subscription.
    Subscribed,
}

/// Why [`TerminalSession::attempt_subscription`] did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeBlocked {
    /// The channel is not connected.
    NotConnected,
    /// The display has no usable dimensions yet.
    DisplayNotReady,
    /// Already subscribed.
    AlreadySubscribed,
    /// A subscribe is awaiting acknowledgment.
    SubscribePending,
    /// The subscribe request could not be sent.
    SendFailed,
}

impl SubscribeBlocked {
    /// Stable tag for logs and callers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::DisplayNotReady => "display_not_ready",
            Self::AlreadySubscribed => "already_subscribed",
            Self::SubscribePending => "subscribe_pending",
            Self::SendFailed => "send_failed",
        }
    }
}

impl std::fmt::Display for SubscribeBlocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscribe that was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeAttempt {
    /// No subscribe had been sent for this display before.
    pub first_attach: bool,
    /// Resume point included in the request.
    pub last_sequence: Option<u64>,
}

/// Subscribe state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subscription {
    state: SubscriptionState,
    has_ever_subscribed: bool,
}

impl Subscription {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Whether a subscribe was ever sent.
    #[must_use]
    pub fn has_ever_subscribed(&self) -> bool {
        self.has_ever_subscribed
    }

    /// Check the preconditions, in order.
    pub fn check(&self, connected: bool, display_ready: bool) -> Result<(), SubscribeBlocked> {
        if !connected {
            return Err(SubscribeBlocked::NotConnected);
        }
        if !display_ready {
            return Err(SubscribeBlocked::DisplayNotReady);
        }
        match self.state {
            SubscriptionState::Unsubscribed => Ok(()),
            SubscriptionState::SubscribeAttempted => Err(SubscribeBlocked::SubscribePending),
            SubscriptionState::Subscribed => Err(SubscribeBlocked::AlreadySubscribed),
        }
    }

    /// Enter `SubscribeAttempted` and work out what to request.
    ///
    /// A first attach never carries a resume point.
    pub fn begin(&mut self, resume_point: Option<u64>) -> SubscribeAttempt {
        self.state = SubscriptionState::SubscribeAttempted;
        let first_attach = !self.has_ever_subscribed;
        SubscribeAttempt {
            first_attach,
            last_sequence: if first_attach { None } else { resume_point },
        }
    }

    /// The request went out.
    pub fn sent(&mut self) {
        self.has_ever_subscribed = true;
    }

    /// The request could not be sent; allow another attempt.
    pub fn abandon(&mut self) {
        self.state = SubscriptionState::Unsubscribed;
    }

    /// The remote acknowledged.
    pub fn confirm(&mut self) {
        self.state = SubscriptionState::Subscribed;
    }

    /// The channel dropped.
    pub fn reset(&mut self) {
        self.state = SubscriptionState::Unsubscribed;
    }
}

impl<D: TerminalDisplay> TerminalSession<D> {
    /// Subscribe to the session's output, or report why not.
    ///
    /// Emits `terminal:subscribe` followed by `terminal:focus`. The first
    /// attach for this display enters the seed phase; later attempts send
    /// the last known sequence and skip seeding.
    pub fn attempt_subscription(
        &mut self,
        channel: &mut dyn Channel,
    ) -> Result<SubscribeAttempt, SubscribeBlocked> {
        if let Err(blocked) = self
            .subscription
            .check(channel.is_connected(), self.display.is_ready())
        {
            log::debug!("[Subscribe] {}: blocked ({blocked})", self.session_id);
            return Err(blocked);
        }

        let attempt = self.subscription.begin(self.sequence.resume_point());
        let request = SubscribeRequest {
            session_id: self.session_id.clone(),
            last_sequence: attempt.last_sequence,
            cols: self.display.cols(),
            rows: self.display.rows(),
        };

        let body = match serde_json::to_value(&request) {
            Ok(body) => body,
            Err(e) => {
                log::error!("[Subscribe] {}: cannot encode request: {e}", self.session_id);
                self.subscription.abandon();
                return Err(SubscribeBlocked::SendFailed);
            }
        };
        if let Err(e) = channel.emit(event::SUBSCRIBE, body) {
            log::warn!("[Subscribe] {}: send failed: {e}", self.session_id);
            self.subscription.abandon();
            return Err(SubscribeBlocked::SendFailed);
        }

        if attempt.first_attach {
            self.transition(PhaseEvent::FirstAttach);
        } else {
            self.seed.reset();
            self.transition(PhaseEvent::ReconnectAttach);
        }

        self.emit_session_request(channel, event::FOCUS);
        self.subscription.sent();

        log::info!(
            "[Subscribe] {}: {} (lastSequence={:?}, {}x{})",
            self.session_id,
            if attempt.first_attach { "first attach" } else { "resubscribe" },
            attempt.last_sequence,
            request.cols,
            request.rows
        );
        Ok(attempt)
    }

    /// Apply the `subscribed` acknowledgment.
    ///
    /// On a reconnect acknowledgment any partial seed is dropped and
    /// writes held back behind a snapshot write are flushed, joined, right
    /// away.
    pub fn handle_subscribed(&mut self, payload: SubscribedPayload) {
        self.subscription.confirm();
        if let Some(current) = non_negative(payload.current_sequence) {
            self.sequence.adopt(current);
        }

        if self.phase.expecting_seed() {
            log::debug!("[Subscribe] {}: subscribed, awaiting seed", self.session_id);
            return;
        }

        self.seed.reset();
        if self.pending_writes.is_empty() {
            return;
        }
        let pending = self.pending_writes.drain();
        log::debug!(
            "[Subscribe] {}: flushing {} pending writes",
            self.session_id,
            pending.len()
        );
        self.display.enqueue(&pending.concat());
    }

    /// Apply `focus_changed`.
    pub fn handle_focus_changed(&mut self, payload: FocusChangedPayload, channel: &dyn Channel) {
        let own = channel.client_id();
        let is_authority = own.is_some() && payload.client_id.as_deref() == own;
        if is_authority != self.is_authority {
            log::info!(
                "[Subscribe] {}: input authority {}",
                self.session_id,
                if is_authority { "gained" } else { "lost" }
            );
        }
        self.is_authority = is_authority;
    }

    /// The channel dropped.
    ///
    /// Marks the session unsubscribed so a reconnect can resubscribe. An
    /// outstanding fetch will never be answered: the frames held for it are
    /// written out in arrival order. An active snapshot write is left to
    /// complete.
    pub fn handle_disconnect(&mut self) {
        self.subscription.reset();
        self.is_authority = false;
        if self.phase == super::SessionPhase::HistoryInFlight {
            self.abandon_fetch();
        }
    }

    pub(super) fn emit_session_request(&mut self, channel: &mut dyn Channel, name: &str) -> bool {
        let request = SessionRequest {
            session_id: self.session_id.clone(),
        };
        let sent = serde_json::to_value(&request)
            .map_err(|e| e.to_string())
            .and_then(|body| channel.emit(name, body).map_err(|e| e.to_string()));
        match sent {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[Subscribe] {}: {name} not sent: {e}", self.session_id);
                false
            }
        }
    }
}
