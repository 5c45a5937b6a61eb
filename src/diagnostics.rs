//! Runtime counters for non-fatal faults.
//!
//! Every dropped frame, rejected pairing or failed publish bumps a counter
//! here instead of propagating.  The snapshot rides along in coordinator
//! telemetry as the additive `diag` object.

use serde::Serialize;

use crate::error::MalformedFrame;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub malformed_radar: u32,
    pub malformed_peer: u32,
    pub malformed_command: u32,
    /// Frames lost in the receive ring (full or oversized).
    pub rx_dropped: u32,
    /// Frames from unknown senders outside a pairing window.
    pub unknown_sender: u32,
    pub send_failures: u32,
    pub registry_full: u32,
    pub publish_dropped: u32,
    pub acks_dropped: u32,
}

impl Counters {
    pub fn malformed(&mut self, kind: MalformedFrame) {
        let slot = match kind {
            MalformedFrame::Radar => &mut self.malformed_radar,
            MalformedFrame::Peer => &mut self.malformed_peer,
            MalformedFrame::Command => &mut self.malformed_command,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total_faults(&self) -> u32 {
        [
            self.malformed_radar,
            self.malformed_peer,
            self.malformed_command,
            self.rx_dropped,
            self.send_failures,
            self.registry_full,
            self.publish_dropped,
            self.acks_dropped,
        ]
        .iter()
        .fold(0u32, |acc, v| acc.saturating_add(*v))
    }
}
