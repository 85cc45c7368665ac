//! Shared fakes for integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use serde_json::{json, Value};
use termsync::channel::{Channel, ChannelError, Envelope};
use termsync::terminal::{
    ScrollPosition, TerminalConfig, TerminalDisplay, TerminalSession, WriteToken,
};

pub const SESSION: &str = "s1";

/// One recorded display call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(String),
    WriteWithAck(String, WriteToken),
    Enqueue(String),
    Reset,
    Clear,
    ScrollToLine(usize),
    SetScrollback(usize),
}

/// Display that records calls and holds write acknowledgments until
/// released.
#[derive(Debug)]
pub struct RecordingDisplay {
    pub ops: Vec<Op>,
    pub position: ScrollPosition,
    pub cols: u16,
    pub rows: u16,
    pending: Vec<WriteToken>,
    released: Vec<WriteToken>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            position: ScrollPosition::default(),
            cols: 80,
            rows: 24,
            pending: Vec::new(),
            released: Vec::new(),
        }
    }

    /// Every string that reached the screen, in order.
    pub fn written(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(s) | Op::WriteWithAck(s, _) | Op::Enqueue(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Tokens issued but not yet acknowledged.
    pub fn outstanding(&self) -> &[WriteToken] {
        &self.pending
    }

    /// Acknowledge every outstanding write.
    pub fn ack_all(&mut self) {
        self.released.append(&mut self.pending);
    }

    pub fn count(&self, wanted: &Op) -> usize {
        self.ops.iter().filter(|op| *op == wanted).count()
    }
}

impl TerminalDisplay for RecordingDisplay {
    fn write(&mut self, data: &str) {
        self.ops.push(Op::Write(data.to_string()));
    }

    fn write_with_ack(&mut self, data: &str, token: WriteToken) {
        self.ops.push(Op::WriteWithAck(data.to_string(), token));
        self.pending.push(token);
    }

    fn take_completed_writes(&mut self) -> Vec<WriteToken> {
        std::mem::take(&mut self.released)
    }

    fn enqueue(&mut self, data: &str) {
        self.ops.push(Op::Enqueue(data.to_string()));
    }

    fn reset(&mut self) {
        self.ops.push(Op::Reset);
    }

    fn clear(&mut self) {
        self.ops.push(Op::Clear);
    }

    fn scroll_to_line(&mut self, line: usize) {
        self.ops.push(Op::ScrollToLine(line));
        self.position.viewport_y = line.min(self.position.base_y);
    }

    fn scroll_position(&mut self) -> ScrollPosition {
        self.position
    }

    fn set_scrollback(&mut self, lines: usize) {
        self.ops.push(Op::SetScrollback(lines));
    }

    fn cols(&self) -> u16 {
        self.cols
    }

    fn rows(&self) -> u16 {
        self.rows
    }
}

/// Channel that records every emitted event.
#[derive(Debug)]
pub struct RecordingChannel {
    pub connected: bool,
    pub id: Option<String>,
    pub sent: Vec<(String, Value)>,
    pub fail_sends: bool,
}

impl RecordingChannel {
    pub fn connected() -> Self {
        Self {
            connected: true,
            id: Some("me".to_string()),
            sent: Vec::new(),
            fail_sends: false,
        }
    }

    pub fn events(&self) -> Vec<&str> {
        self.sent.iter().map(|(event, _)| event.as_str()).collect()
    }

    pub fn last_payload(&self, event: &str) -> Option<&Value> {
        self.sent
            .iter()
            .rev()
            .find(|(name, _)| name == event)
            .map(|(_, payload)| payload)
    }
}

impl Channel for RecordingChannel {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn client_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn emit(&mut self, event: &str, payload: Value) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::SendFailed("test".to_string()));
        }
        self.sent.push((event.to_string(), payload));
        Ok(())
    }
}

pub type Session = TerminalSession<RecordingDisplay>;

pub fn session_with(config: TerminalConfig) -> Session {
    TerminalSession::new(SESSION, RecordingDisplay::new(), config)
}

pub fn session() -> Session {
    session_with(TerminalConfig::default())
}

pub fn terminal(kind: &str, payload: Value) -> Envelope {
    Envelope::new(format!("terminal/{SESSION}"), kind, payload)
}

pub fn data(text: &str, sequence: i64) -> Envelope {
    terminal("data", json!({ "data": text, "sequence": sequence }))
}

pub fn history(text: &str, captured: i64) -> Envelope {
    terminal(
        "full_history",
        json!({ "history": text, "capturedSequence": captured }),
    )
}

/// A session past first attach, acknowledged, seed complete, with the
/// recorders cleared.
pub fn live_session() -> (Session, RecordingChannel) {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    session
        .attempt_subscription(&mut channel)
        .expect("first subscribe");
    session.handle_envelope(&terminal("subscribed", json!({})), &mut channel);
    session.handle_envelope(
        &terminal(
            "seed_ansi",
            json!({ "chunk": 0, "totalChunks": 1, "data": "seed" }),
        ),
        &mut channel,
    );
    channel.sent.clear();
    session.display_mut().ops.clear();
    (session, channel)
}
