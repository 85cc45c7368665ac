//! Bounded frame buffers for output held back from the display.
//!
//! Both reconciliation buffers (frames buffered against an in-flight
//! history fetch, and writes buffered against an in-progress history
//! write) share one eviction policy. Two thresholds are checked
//! independently after every insertion:
//!
//! - **Count**: above `max_count` entries, trim to the newest
//!   `target_count`.
//! - **Bytes**: above `max_bytes`, evict oldest entries until the total is
//!   at or below the cap, or until the count would drop below
//!   `target_count`, whichever binds first.
//!
//! Eviction is always oldest-first, so memory stays bounded under a
//! stalled fetch or write callback while the most recent output survives.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::constants::{BUFFER_MAX_BYTES, BUFFER_MAX_COUNT, BUFFER_TARGET_COUNT};

/// Something with a byte weight for the size threshold.
pub trait Weighted {
    /// Payload size in bytes.
    fn weight(&self) -> usize;
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Thresholds for a [`BoundedBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferLimits {
    /// Entry count that triggers a count trim.
    pub max_count: usize,
    /// Entry count kept after a count trim; floor for byte eviction.
    pub target_count: usize,
    /// Total payload bytes that trigger byte eviction.
    pub max_bytes: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_count: BUFFER_MAX_COUNT,
            target_count: BUFFER_TARGET_COUNT,
            max_bytes: BUFFER_MAX_BYTES,
        }
    }
}

/// FIFO buffer that evicts its oldest entries past [`BufferLimits`].
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    bytes: usize,
    limits: BufferLimits,
    evicted: u64,
}

impl BufferLimits {
    /// These limits with `target_count` capped at `max_count`.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.target_count <= self.max_count {
            return self;
        }
        log::warn!(
            "[Overflow] target_count {} exceeds max_count {}, using {}",
            self.target_count,
            self.max_count,
            self.max_count
        );
        Self {
            target_count: self.max_count,
            ..self
        }
    }
}

impl<T: Weighted> BoundedBuffer<T> {
    /// Create an empty buffer with the given thresholds.
    #[must_use]
    pub fn new(limits: BufferLimits) -> Self {
        Self {
            items: VecDeque::new(),
            bytes: 0,
            limits: limits.normalized(),
            evicted: 0,
        }
    }

    /// Append an entry, then apply both thresholds.
    ///
    /// Returns the number of entries evicted by this insertion.
    pub fn push(&mut self, item: T) -> usize {
        self.bytes += item.weight();
        self.items.push_back(item);

        let mut dropped = 0;

        if self.items.len() > self.limits.max_count {
            let excess = self.items.len().saturating_sub(self.limits.target_count);
            for _ in 0..excess {
                dropped += usize::from(self.evict_oldest());
            }
        }

        while self.bytes > self.limits.max_bytes && self.items.len() > self.limits.target_count {
            dropped += usize::from(self.evict_oldest());
        }

        if dropped > 0 {
            self.evicted += dropped as u64;
            log::warn!(
                "[Overflow] evicted {} oldest entries (now {} entries, {} bytes, {} evicted total)",
                dropped,
                self.items.len(),
                self.bytes,
                self.evicted
            );
        }

        dropped
    }

    fn evict_oldest(&mut self) -> bool {
        match self.items.pop_front() {
            Some(item) => {
                self.bytes -= item.weight();
                true
            }
            None => false,
        }
    }

    /// Remove and return every entry, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        self.bytes = 0;
        self.items.drain(..).collect()
    }

    /// Discard every entry. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        self.bytes = 0;
        count
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total payload bytes currently buffered.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Entries evicted over the buffer's lifetime.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn small_limits() -> BufferLimits {
        BufferLimits {
            max_count: 10,
            target_count: 5,
            max_bytes: 64,
        }
    }

    // ── Construction ──────────────────────────────────────────────────────

    #[test]
    fn test_new_buffer_is_empty() {
        let buf: BoundedBuffer<String> = BoundedBuffer::new(BufferLimits::default());
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.bytes(), 0);
        assert_eq!(buf.evicted(), 0);
    }

    #[test]
    fn test_default_limits() {
        let limits = BufferLimits::default();
        assert_eq!(limits.max_count, 1000);
        assert_eq!(limits.target_count, 500);
        assert_eq!(limits.max_bytes, 2 * 1024 * 1024);
    }

    // ── Count threshold ───────────────────────────────────────────────────

    #[test]
    fn test_count_overflow_keeps_most_recent_target() {
        let mut buf = BoundedBuffer::new(BufferLimits::default());
        let mut dropped = 0;
        for i in 1..=1001 {
            dropped += buf.push(format!("{}", i % 10));
        }
        assert_eq!(buf.len(), 500);
        assert_eq!(dropped, 501);
        assert_eq!(buf.evicted(), 501);
    }

    #[test]
    fn test_count_overflow_retains_newest_entries_in_order() {
        let mut buf = BoundedBuffer::new(small_limits());
        for i in 0..11 {
            buf.push(format!("{i}"));
        }
        let kept: Vec<String> = buf.drain();
        assert_eq!(kept, vec!["6", "7", "8", "9", "10"]);
    }

    #[test]
    fn test_at_max_count_no_eviction() {
        let mut buf = BoundedBuffer::new(small_limits());
        for i in 0..10 {
            assert_eq!(buf.push(format!("{i}")), 0);
        }
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_inverted_limits_trim_to_max_count() {
        let mut buf = BoundedBuffer::new(BufferLimits {
            max_count: 10,
            target_count: 20,
            max_bytes: 1024,
        });
        let mut dropped = 0;
        for i in 0..11 {
            dropped += buf.push(format!("{i}"));
        }
        assert_eq!(dropped, 1);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.iter().next().map(String::as_str), Some("1"));
    }

    #[test]
    fn test_normalized_leaves_valid_limits_alone() {
        assert_eq!(BufferLimits::default().normalized(), BufferLimits::default());
        let fixed = BufferLimits {
            max_count: 3,
            target_count: 7,
            max_bytes: 0,
        }
        .normalized();
        assert_eq!(fixed.target_count, 3);
    }

    // ── Byte threshold ────────────────────────────────────────────────────

    #[test]
    fn test_byte_overflow_evicts_oldest_until_under_cap() {
        let mut buf = BoundedBuffer::new(BufferLimits {
            max_count: 100,
            target_count: 1,
            max_bytes: 10,
        });
        buf.push("aaaa".to_string());
        buf.push("bbbb".to_string());
        assert_eq!(buf.bytes(), 8);

        let dropped = buf.push("cccc".to_string());
        assert_eq!(dropped, 1);
        assert_eq!(buf.bytes(), 8);
        assert_eq!(buf.drain(), vec!["bbbb", "cccc"]);
    }

    #[test]
    fn test_byte_eviction_stops_at_target_count() {
        let mut buf = BoundedBuffer::new(BufferLimits {
            max_count: 100,
            target_count: 2,
            max_bytes: 4,
        });
        buf.push("xxxxxxxx".to_string());
        buf.push("yyyyyyyy".to_string());
        buf.push("zzzzzzzz".to_string());

        // Over the byte cap, but the count floor binds first.
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.bytes(), 16);
    }

    #[test]
    fn test_single_oversized_entry_is_kept() {
        let mut buf = BoundedBuffer::new(small_limits());
        buf.push("z".repeat(1024));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.bytes(), 1024);
    }

    // ── Drain / clear ─────────────────────────────────────────────────────

    #[test]
    fn test_drain_returns_arrival_order_and_resets_bytes() {
        let mut buf = BoundedBuffer::new(small_limits());
        buf.push("one".to_string());
        buf.push("two".to_string());
        assert_eq!(buf.drain(), vec!["one", "two"]);
        assert!(buf.is_empty());
        assert_eq!(buf.bytes(), 0);
    }

    #[test]
    fn test_clear_reports_dropped_count() {
        let mut buf = BoundedBuffer::new(small_limits());
        buf.push("a".to_string());
        buf.push("b".to_string());
        assert_eq!(buf.clear(), 2);
        assert!(buf.is_empty());
        assert_eq!(buf.bytes(), 0);
    }

    #[test]
    fn test_push_after_clear_works() {
        let mut buf = BoundedBuffer::new(small_limits());
        buf.push("old".to_string());
        buf.clear();
        buf.push("new".to_string());
        assert_eq!(buf.iter().cloned().collect::<Vec<_>>(), vec!["new"]);
    }
}
