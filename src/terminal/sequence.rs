//! Last applied output sequence number for a session.
//!
//! The tracker is the single answer to "how far has the display caught
//! up". The subscription layer reads it to decide whether a resubscribe
//! can resume from a known point or needs a full reseed.

use serde::{Deserialize, Serialize};

/// How live frames update the tracked sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencePolicy {
    /// Keep `max(current, incoming)`. A late frame never regresses the
    /// resume point.
    #[default]
    Monotonic,
    /// Store whatever arrived last, even if older.
    LastWriteWins,
}

/// Holds the last output sequence observed for one session.
///
/// `0` means nothing has been observed yet.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    last: u64,
    policy: SequencePolicy,
}

impl SequenceTracker {
    /// Create a tracker that has seen nothing.
    #[must_use]
    pub fn new(policy: SequencePolicy) -> Self {
        Self { last: 0, policy }
    }

    /// Record the sequence number carried by a live frame.
    ///
    /// Returns `true` if the stored value changed.
    pub fn record(&mut self, sequence: u64) -> bool {
        let next = match self.policy {
            SequencePolicy::Monotonic => self.last.max(sequence),
            SequencePolicy::LastWriteWins => sequence,
        };
        if sequence < self.last {
            log::debug!(
                "[Sequence] out-of-order frame seq={} (current={}, policy={:?})",
                sequence,
                self.last,
                self.policy
            );
        }
        let changed = next != self.last;
        self.last = next;
        changed
    }

    /// Adopt a sequence reported by the remote, ignoring the policy.
    ///
    /// The remote's `subscribed` acknowledgment is authoritative, including
    /// after it restarted its own numbering.
    pub fn adopt(&mut self, sequence: u64) {
        self.last = sequence;
    }

    /// Last recorded sequence.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.last
    }

    /// Resume point for a resubscribe, if anything was observed.
    #[must_use]
    pub fn resume_point(&self) -> Option<u64> {
        (self.last > 0).then_some(self.last)
    }
}
