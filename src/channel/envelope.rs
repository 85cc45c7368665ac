//! Wire shapes for channel frames.
//!
//! Inbound frames are envelopes `{topic, type, payload, ts}` addressed by
//! topic: `terminal/<session>`, `session/<session>` or `system`. Outbound
//! frames are `{event, payload}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing topic.
    pub topic: String,
    /// Message type within the topic.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body.
    #[serde(default)]
    pub payload: Value,
    /// Send time as an RFC 3339 string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// Destination of an envelope, parsed from its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// `terminal/<session>`.
    Terminal(&'a str),
    /// `session/<session>`.
    Session(&'a str),
    /// `system`.
    System,
    /// Anything else.
    Other(&'a str),
}

impl Envelope {
    /// Build an envelope stamped with the current time.
    pub fn new(topic: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            kind: kind.into(),
            payload,
            ts: Some(Utc::now().to_rfc3339()),
        }
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Where this envelope is addressed.
    #[must_use]
    pub fn route(&self) -> Route<'_> {
        if self.topic == "system" {
            return Route::System;
        }
        match self.topic.split_once('/') {
            Some(("terminal", id)) if !id.is_empty() => Route::Terminal(id),
            Some(("session", id)) if !id.is_empty() => Route::Session(id),
            _ => Route::Other(&self.topic),
        }
    }

    /// Parsed send time, if present and well-formed.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let ts = self.ts.as_deref()?;
        DateTime::parse_from_rfc3339(ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Time between sending and `now`, if the envelope carries a timestamp.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.timestamp().map(|sent| now - sent)
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame<'a> {
    /// Event name.
    pub event: &'a str,
    /// Event body, `null` when the event carries none.
    pub payload: Value,
}

impl OutboundFrame<'_> {
    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
