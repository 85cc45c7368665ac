//! Live frame routing.

use super::history::BufferedFrame;
use super::messages::{non_negative, DataPayload};
use super::phase::FrameDisposition;
use super::{TerminalDisplay, TerminalSession};

impl<D: TerminalDisplay> TerminalSession<D> {
    /// Route one `data` frame by the current phase, then record its
    /// sequence.
    ///
    /// A negative or missing sequence marks the frame unsequenced; it is
    /// kept through any snapshot merge and does not touch the tracker.
    pub fn handle_data(&mut self, payload: DataPayload) {
        let sequence = non_negative(payload.sequence);

        match self.phase.disposition() {
            FrameDisposition::InFlight => {
                self.in_flight.push(BufferedFrame {
                    sequence,
                    data: payload.data,
                });
            }
            FrameDisposition::PendingWrite => {
                self.pending_writes.push(payload.data);
            }
            FrameDisposition::Display => self.display.enqueue(&payload.data),
        }

        if let Some(sequence) = sequence {
            self.sequence.record(sequence);
        }
    }
}
