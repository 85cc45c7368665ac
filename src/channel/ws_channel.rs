//! [`Channel`] over the WebSocket runtime.
//!
//! The session runs on the runtime's task and must not await, so `emit`
//! serializes the frame and queues it on an unbounded mpsc. A writer task
//! owned by the runtime drains the queue into the socket. Each connection
//! gets a fresh queue via [`WsChannel::attach_sender`].

use serde_json::Value;
use tokio::sync::mpsc;

use super::{Channel, ChannelError, ConnectionState, OutboundFrame};

/// WebSocket-backed channel handle.
#[derive(Debug, Default)]
pub struct WsChannel {
    outbound: Option<mpsc::UnboundedSender<String>>,
    state: ConnectionState,
    client_id: Option<String>,
}

impl WsChannel {
    /// Create a disconnected channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route future emits to a new connection's writer queue.
    pub fn attach_sender(&mut self, sender: mpsc::UnboundedSender<String>) {
        self.outbound = Some(sender);
        self.state = ConnectionState::Connected;
    }

    /// Drop the writer queue, e.g. after the socket closed.
    pub fn detach_sender(&mut self) {
        self.outbound = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Update the reported connection state.
    pub fn set_state(&mut self, state: ConnectionState) {
        if state != ConnectionState::Connected {
            self.outbound = None;
        }
        self.state = state;
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Record the identity assigned by the remote's `welcome`.
    pub fn set_client_id(&mut self, client_id: Option<String>) {
        log::info!("[Channel] client id {:?}", client_id);
        self.client_id = client_id;
    }
}

impl Channel for WsChannel {
    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    fn emit(&mut self, event: &str, payload: Value) -> Result<(), ChannelError> {
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(ChannelError::Closed);
        };
        let text = OutboundFrame { event, payload }
            .to_text()
            .map_err(|e| ChannelError::SendFailed(format!("encode {event}: {e}")))?;
        outbound.send(text).map_err(|e| {
            ChannelError::SendFailed(format!("writer queue closed ({} bytes dropped)", e.0.len()))
        })?;
        log::trace!("[Channel] queued {event}");
        Ok(())
    }
}
