//! Seed assembly for first attach.
//!
//! The remote sends the initial view as `totalChunks` ANSI pieces that may
//! arrive out of order or more than once. [`SeedAssembler`] stores each
//! piece by index, counts distinct indices, and hands back the joined
//! payload once every index has been seen. A malformed chunk is rejected
//! on its own; assembly of the remaining chunks continues.

// Rust guideline compliant 2026-02

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::HandlerError;
use super::messages::SeedChunkPayload;
use crate::constants::MAX_SEED_CHUNKS;

/// What to do with a completed seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Drop the assembled bytes. The attached process redraws its own
    /// screen, and stale seed bytes can corrupt cursor-relative redraws.
    #[default]
    Discard,
    /// Reset the display and write the seed as its only content.
    Render,
}

/// A fully assembled seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledSeed {
    /// Chunks joined in index order.
    pub payload: String,
    /// Remote width, if reported.
    pub cols: Option<u16>,
    /// Remote height, if reported.
    pub rows: Option<u16>,
    /// Cursor `(x, y)`, zero-based, if both coordinates were reported.
    pub cursor: Option<(u16, u16)>,
}

/// Result of accepting one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedProgress {
    /// More chunks are needed.
    Pending {
        /// Distinct chunk indices received so far.
        received: usize,
        /// Chunks in the seed.
        total: usize,
    },
    /// The last missing chunk arrived.
    Complete(AssembledSeed),
}

#[derive(Debug)]
struct SeedState {
    total: usize,
    chunks: Vec<Option<String>>,
    received: BTreeSet<usize>,
    cols: Option<u16>,
    rows: Option<u16>,
    cursor_x: Option<u16>,
    cursor_y: Option<u16>,
}

impl SeedState {
    fn new(total: usize) -> Self {
        Self {
            total,
            chunks: vec![None; total],
            received: BTreeSet::new(),
            cols: None,
            rows: None,
            cursor_x: None,
            cursor_y: None,
        }
    }

    fn assemble(self) -> AssembledSeed {
        let payload: String = self.chunks.into_iter().flatten().collect();
        AssembledSeed {
            payload,
            cols: self.cols,
            rows: self.rows,
            cursor: self.cursor_x.zip(self.cursor_y),
        }
    }
}

/// Reassembles chunked seeds. Holds state only while a seed is incomplete.
#[derive(Debug, Default)]
pub struct SeedAssembler {
    state: Option<SeedState>,
}

impl SeedAssembler {
    /// Create an assembler with no seed in progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one chunk.
    ///
    /// Duplicate indices overwrite the earlier data without being counted
    /// twice. A chunk reporting a different `totalChunks` than the seed in
    /// progress starts a new seed.
    pub fn accept(&mut self, payload: SeedChunkPayload) -> Result<SeedProgress, HandlerError> {
        let (index, total, data) = validate(&payload)?;

        if let Some(previous) = self.state.as_ref().map(|s| s.total).filter(|t| *t != total) {
            log::warn!("[Seed] totalChunks changed {previous} -> {total}, restarting assembly");
            self.state = None;
        }

        let state = self.state.get_or_insert_with(|| SeedState::new(total));
        state.chunks[index] = Some(data);
        if !state.received.insert(index) {
            log::debug!("[Seed] duplicate chunk {index}/{total}");
        }
        state.cols = payload.cols.or(state.cols);
        state.rows = payload.rows.or(state.rows);
        state.cursor_x = payload.cursor_x.or(state.cursor_x);
        state.cursor_y = payload.cursor_y.or(state.cursor_y);

        if state.received.len() < state.total {
            return Ok(SeedProgress::Pending {
                received: state.received.len(),
                total: state.total,
            });
        }

        match self.state.take() {
            Some(state) => Ok(SeedProgress::Complete(state.assemble())),
            None => Ok(SeedProgress::Pending { received: 0, total }),
        }
    }

    /// Drop any partial seed.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.take() {
            log::debug!(
                "[Seed] discarding partial seed ({}/{} chunks)",
                state.received.len(),
                state.total
            );
        }
    }

    /// True while a seed is partially assembled.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.state.is_some()
    }

    /// Distinct chunks received for the seed in progress.
    #[must_use]
    pub fn received_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.received.len())
    }
}

fn validate(payload: &SeedChunkPayload) -> Result<(usize, usize, String), HandlerError> {
    let malformed = |reason: &str| HandlerError::MalformedPayload {
        handler: "seed_ansi",
        reason: reason.to_string(),
    };

    let chunk = payload.chunk.ok_or_else(|| malformed("missing chunk"))?;
    let total = payload
        .total_chunks
        .ok_or_else(|| malformed("missing totalChunks"))?;
    let data = payload
        .data
        .clone()
        .ok_or_else(|| malformed("missing data"))?;

    match (usize::try_from(chunk).ok(), usize::try_from(total).ok()) {
        (Some(index), Some(count)) if count > 0 && count <= MAX_SEED_CHUNKS && index < count => {
            Ok((index, count, data))
        }
        _ => Err(HandlerError::InvalidChunk { chunk, total }),
    }
}
