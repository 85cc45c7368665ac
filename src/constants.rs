//! Application-wide constants for termsync.
//!
//! Constants are grouped by domain. Values that users may want to tune are
//! defaults for fields in [`crate::config::Config`]; the rest are fixed.
//!
//! # Categories
//!
//! - **Buffers**: Overflow thresholds for reconciliation buffers
//! - **Display**: Emulator dimensions and scrollback
//! - **Reconnect**: Backoff between connection attempts

use std::time::Duration;

// ============================================================================
// Buffers
// ============================================================================

/// Entry count above which a reconciliation buffer is trimmed.
pub const BUFFER_MAX_COUNT: usize = 1000;

/// Entry count a buffer is trimmed down to.
///
/// Also the floor for byte-based eviction: the byte threshold never evicts
/// a buffer below this many entries.
pub const BUFFER_TARGET_COUNT: usize = 500;

/// Total payload bytes above which oldest entries are evicted (2 MiB).
pub const BUFFER_MAX_BYTES: usize = 2 * 1024 * 1024;

/// Upper bound on `totalChunks` accepted for a seed.
///
/// Guards the chunk table allocation against a corrupt header.
pub const MAX_SEED_CHUNKS: usize = 4096;

// ============================================================================
// Display
// ============================================================================

/// Default scrollback depth for history reloads.
pub const SCROLLBACK_LINES: usize = 10_000;

/// Smallest row count the emulator is created with.
pub const MIN_DISPLAY_ROWS: u16 = 1;

/// Fallback width when the host terminal size is unknown.
pub const DEFAULT_COLS: u16 = 80;

/// Fallback height when the host terminal size is unknown.
pub const DEFAULT_ROWS: u16 = 24;

// ============================================================================
// Reconnect
// ============================================================================

/// First delay after a dropped connection.
pub const RECONNECT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Cap for the doubling reconnect delay.
pub const RECONNECT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Timeout for the WebSocket handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
