//! termsync - keeps a remote terminal view consistent with its output
//! stream.
//!
//! The remote side is an interactive terminal (a tmux-backed PTY) that
//! streams sequenced output frames over a duplex message channel. Frames
//! may arrive reordered, replayed or interrupted by reconnects, and the
//! viewer can ask for full-scrollback snapshots at any time. This crate
//! merges all of that into one display without gaps or duplicates.
//!
//! # Architecture
//!
//! - **Terminal** - Reconciliation engine, one [`TerminalSession`] per display
//! - **Channel** - Transport seam, envelopes, WebSocket-backed channel
//! - **Attach** - Runtime that pumps the channel into a session and renders
//!
//! # Modules
//!
//! - [`terminal`] - Session state, seed/history/live handlers, display trait
//! - [`channel`] - `Channel` trait and wire shapes
//! - [`attach`] - Connect/reconnect loop for the CLI
//! - [`config`] - Configuration loading/saving

pub mod attach;
pub mod channel;
pub mod config;
pub mod constants;
pub mod env;
pub mod terminal;
pub mod ws;

// Re-export commonly used types
pub use channel::{Channel, ChannelError, Envelope};
pub use config::Config;
pub use terminal::{TerminalConfig, TerminalDisplay, TerminalSession, Vt100Display};
