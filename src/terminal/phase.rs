//! Session phases and the transition function.
//!
//! A session is in exactly one [`SessionPhase`] at a time, and
//! [`SessionPhase::next`] is the only way it moves between them. The phase
//! decides where an incoming data frame goes (see [`FrameDisposition`]), so
//! "buffering against a fetch" and "buffering against a write" can never
//! both be active.
//!
//! ```text
//!  Idle ──FirstAttach──> SeedAwaiting ──SeedCompleted──> Live
//!   │                        │                            │
//!   └──ReconnectAttach──> Live <──────────────────────────┘
//!
//!  Live/SeedAwaiting ──HistoryRequested──> HistoryInFlight
//!  any ──HistoryWriteStarted──> HistoryWriting{token}
//!  HistoryWriting{token} ──WriteCompleted(token)──> Live
//!  any ──Detached──> Idle
//! ```

// Rust guideline compliant 2026-02

use super::display::WriteToken;

/// Where the session is in its attach/reload lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not attached.
    #[default]
    Idle,
    /// First-attach subscribe sent; the seed has not completed.
    SeedAwaiting,
    /// A history snapshot was requested and has not arrived.
    HistoryInFlight,
    /// A history snapshot is being written to the display.
    HistoryWriting {
        /// Token of the acknowledged write.
        token: WriteToken,
        /// Sequence the snapshot is current as of.
        captured_sequence: u64,
        /// Whether the snapshot answers a request made by this session.
        solicited: bool,
    },
    /// Frames go straight to the display.
    Live,
}

/// Something that can move the session to another phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// First subscribe for this display was sent.
    FirstAttach,
    /// A resubscribe was sent.
    ReconnectAttach,
    /// Every seed chunk arrived.
    SeedCompleted,
    /// A history fetch was requested.
    HistoryRequested,
    /// A snapshot write was issued.
    HistoryWriteStarted {
        /// Token of the write.
        token: WriteToken,
        /// Capture point of the snapshot.
        captured_sequence: u64,
        /// Whether the snapshot was requested.
        solicited: bool,
    },
    /// A snapshot carried nothing new and was dropped.
    HistorySkipped,
    /// A snapshot arrived with no history bytes.
    HistoryEmpty,
    /// The display finished an acknowledged write.
    WriteCompleted(WriteToken),
    /// The channel dropped.
    Disconnected,
    /// The display was unmounted.
    Detached,
}

/// Destination for one incoming data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Buffer with its sequence, to be filtered against the snapshot.
    InFlight,
    /// Buffer as plain bytes, discarded when the write completes.
    PendingWrite,
    /// Hand to the display.
    Display,
}

impl SessionPhase {
    /// Apply `event`, returning the resulting phase.
    ///
    /// Events that do not apply to the current phase leave it unchanged.
    #[must_use]
    pub fn next(self, event: PhaseEvent) -> Self {
        use PhaseEvent as E;
        use SessionPhase as P;

        match (self, event) {
            (_, E::Detached) => P::Idle,

            (P::Idle | P::SeedAwaiting | P::Live, E::FirstAttach) => P::SeedAwaiting,
            (P::Idle | P::SeedAwaiting, E::ReconnectAttach) => P::Live,
            (P::SeedAwaiting, E::SeedCompleted) => P::Live,

            (P::Idle | P::SeedAwaiting | P::Live, E::HistoryRequested) => P::HistoryInFlight,
            (
                _,
                E::HistoryWriteStarted {
                    token,
                    captured_sequence,
                    solicited,
                },
            ) => P::HistoryWriting {
                token,
                captured_sequence,
                solicited,
            },
            (P::HistoryInFlight, E::HistorySkipped) => P::Live,
            (P::HistoryInFlight | P::HistoryWriting { .. }, E::HistoryEmpty) => P::Live,
            (P::HistoryWriting { token, .. }, E::WriteCompleted(done)) if token == done => P::Live,
            (P::HistoryInFlight, E::Disconnected) => P::Live,

            (phase, _) => phase,
        }
    }

    /// Where a data frame arriving now should go.
    #[must_use]
    pub fn disposition(self) -> FrameDisposition {
        match self {
            Self::HistoryInFlight
            | Self::HistoryWriting {
                solicited: true, ..
            } => FrameDisposition::InFlight,
            Self::HistoryWriting {
                solicited: false, ..
            } => FrameDisposition::PendingWrite,
            Self::Idle | Self::SeedAwaiting | Self::Live => FrameDisposition::Display,
        }
    }

    /// True exactly while a first-attach seed is outstanding.
    #[must_use]
    pub fn expecting_seed(self) -> bool {
        matches!(self, Self::SeedAwaiting)
    }

    /// True while a snapshot is being fetched or written.
    #[must_use]
    pub fn is_history_active(self) -> bool {
        matches!(self, Self::HistoryInFlight | Self::HistoryWriting { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SeedAwaiting => "seed_awaiting",
            Self::HistoryInFlight => "history_in_flight",
            Self::HistoryWriting { .. } => "history_writing",
            Self::Live => "live",
        }
    }
}
