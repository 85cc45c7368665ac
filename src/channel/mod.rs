//! Duplex message channel between a session and the remote.
//!
//! The engine only needs three things from a transport: whether it is
//! connected, which identity the remote assigned it, and a way to emit a
//! named event. [`Channel`] is that seam. [`WsChannel`] implements it over
//! the WebSocket runtime; tests implement it with a recorder.
//!
//! ```text
//! remote ──text frame──> Envelope ──> TerminalSession::handle_envelope
//!    ^                                        │
//!    └──── {"event","payload"} <── Channel::emit
//! ```

// Rust guideline compliant 2026-02

pub mod envelope;
pub mod ws_channel;

pub use envelope::{Envelope, OutboundFrame, Route};
pub use ws_channel::WsChannel;

/// Connection state for a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Connected and ready.
    Connected,
    /// Waiting to retry after a drop.
    Reconnecting {
        /// Reconnection attempt number.
        attempt: u32,
        /// Milliseconds until the next attempt.
        next_retry_ms: u64,
    },
}

/// Errors that can occur during channel operations.
#[derive(Debug)]
pub enum ChannelError {
    /// Failed to send message.
    SendFailed(String),
    /// Channel was closed.
    Closed,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SendFailed(msg) => write!(f, "Send failed: {msg}"),
            Self::Closed => write!(f, "Channel closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// The transport as seen by a session.
pub trait Channel {
    /// Whether emitted events can currently reach the remote.
    fn is_connected(&self) -> bool;

    /// Identity the remote assigned to this client, once known.
    fn client_id(&self) -> Option<&str>;

    /// Send a named event.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the frame cannot be
    /// queued.
    fn emit(&mut self, event: &str, payload: serde_json::Value) -> Result<(), ChannelError>;
}
