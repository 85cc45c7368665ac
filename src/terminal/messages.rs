//! Typed payloads for terminal channel messages.
//!
//! Inbound payloads keep every field optional (or defaulted) so that a
//! partially-formed message can still be inspected and rejected with a
//! precise reason instead of a generic decode failure. Outbound request
//! payloads serialize with the remote's camelCase field names.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::HandlerError;

/// Message `type` values on the channel envelope.
pub mod kind {
    /// Subscribe acknowledgment (`terminal/<id>`).
    pub const SUBSCRIBED: &str = "subscribed";
    /// One chunk of the initial seed (`terminal/<id>`).
    pub const SEED_ANSI: &str = "seed_ansi";
    /// Live output frame (`terminal/<id>`).
    pub const DATA: &str = "data";
    /// Full scrollback snapshot (`terminal/<id>`).
    pub const FULL_HISTORY: &str = "full_history";
    /// Input authority moved (`terminal/<id>`).
    pub const FOCUS_CHANGED: &str = "focus_changed";
    /// Keepalive (`system`).
    pub const PING: &str = "ping";
    /// Channel identity assignment (`system`).
    pub const WELCOME: &str = "welcome";
    /// Remote process lifecycle (`session/<id>`).
    pub const STATE_CHANGE: &str = "state_change";
}

/// Outbound event names.
pub mod event {
    /// Subscribe to a session's output.
    pub const SUBSCRIBE: &str = "terminal:subscribe";
    /// Claim input authority.
    pub const FOCUS: &str = "terminal:focus";
    /// Ask for a full scrollback snapshot.
    pub const REQUEST_HISTORY: &str = "terminal:request_history";
    /// Keepalive reply.
    pub const PONG: &str = "pong";
}

/// Decode a handler payload, treating `null` as an empty object.
pub fn parse_payload<T: DeserializeOwned>(
    handler: &'static str,
    payload: &serde_json::Value,
) -> Result<T, HandlerError> {
    let value = if payload.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        payload.clone()
    };
    serde_json::from_value(value).map_err(|e| HandlerError::MalformedPayload {
        handler,
        reason: e.to_string(),
    })
}

/// Negative sequence numbers are the remote's "unsequenced" sentinel.
pub(crate) fn non_negative(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

/// `terminal/<id>` `subscribed`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedPayload {
    /// Remote's current output sequence.
    #[serde(default)]
    pub current_sequence: Option<i64>,
}

/// `terminal/<id>` `seed_ansi`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedChunkPayload {
    /// Zero-based chunk index.
    #[serde(default)]
    pub chunk: Option<i64>,
    /// Number of chunks in the seed.
    #[serde(default)]
    pub total_chunks: Option<i64>,
    /// ANSI bytes for this chunk.
    #[serde(default)]
    pub data: Option<String>,
    /// Whether older scrollback can be fetched.
    #[serde(default)]
    pub has_history: Option<bool>,
    /// Remote terminal width.
    #[serde(default)]
    pub cols: Option<u16>,
    /// Remote terminal height.
    #[serde(default)]
    pub rows: Option<u16>,
    /// Cursor column (zero-based).
    #[serde(default)]
    pub cursor_x: Option<u16>,
    /// Cursor row (zero-based).
    #[serde(default)]
    pub cursor_y: Option<u16>,
}

/// `terminal/<id>` `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPayload {
    /// Raw output bytes.
    pub data: String,
    /// Output sequence, absent for unsequenced frames.
    #[serde(default)]
    pub sequence: Option<i64>,
}

impl DataPayload {
    /// Build an unsequenced frame.
    pub fn unsequenced(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            sequence: None,
        }
    }

    /// Build a sequenced frame.
    pub fn sequenced(data: impl Into<String>, sequence: u64) -> Self {
        Self {
            data: data.into(),
            sequence: i64::try_from(sequence).ok(),
        }
    }
}

/// `terminal/<id>` `full_history`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullHistoryPayload {
    /// Full scrollback as ANSI text.
    #[serde(default)]
    pub history: Option<String>,
    /// Output sequence the snapshot is current as of.
    #[serde(default)]
    pub captured_sequence: Option<i64>,
    /// Whether even older scrollback can be fetched.
    #[serde(default)]
    pub has_history: Option<bool>,
    /// Cursor column at capture time.
    #[serde(default)]
    pub cursor_x: Option<u16>,
    /// Cursor row at capture time.
    #[serde(default)]
    pub cursor_y: Option<u16>,
}

/// `terminal/<id>` `focus_changed`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusChangedPayload {
    /// Channel identity now holding input authority.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// `system` `welcome`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    /// Identity the channel assigned to this client.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Remote process status reported by `session/<id>` `state_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Process started.
    Started,
    /// Process exited normally.
    Ended,
    /// Process exited abnormally.
    Crashed,
    /// Session expired.
    Timeout,
}

impl SessionStatus {
    /// Whether the lifecycle observer should be notified.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Crashed | Self::Timeout)
    }
}

/// `session/<id>` `state_change`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangePayload {
    /// Session the change applies to.
    pub session_id: String,
    /// New status.
    pub status: SessionStatus,
    /// Optional human-readable detail.
    #[serde(default)]
    pub message: Option<String>,
}

/// `terminal:subscribe` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Session to attach to.
    pub session_id: String,
    /// Resume point; omitted on first attach to force a full seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sequence: Option<u64>,
    /// Display width.
    pub cols: u16,
    /// Display height.
    pub rows: u16,
}

/// Body for requests that only name the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Target session.
    pub session_id: String,
}
