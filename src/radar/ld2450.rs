//! HLK-LD2450 report frame parser.
//!
//! ```text
//!  AA FF 03 00 | target0 (8) | target1 (8) | target2 (8) | 55 CC
//!  target: x:i16  y:i16  speed:i16  resolution:u16   (little endian)
//! ```
//!
//! Coordinates use sign-magnitude with an inverted sign bit: bit 15 set
//! means positive.  Bytes are fed one at a time so the parser can sit
//! directly behind a UART ring with no framing guarantees.

use crate::error::MalformedFrame;

pub const HEADER: [u8; 4] = [0xAA, 0xFF, 0x03, 0x00];
pub const TAIL: [u8; 2] = [0x55, 0xCC];
pub const TARGET_SLOTS: usize = 3;
const TARGET_LEN: usize = 8;
pub const FRAME_LEN: usize = HEADER.len() + TARGET_SLOTS * TARGET_LEN + TAIL.len();

/// One target slot as reported by the sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawTarget {
    pub x_mm: i16,
    pub y_mm: i16,
    pub speed_cm_s: i16,
    pub resolution_mm: u16,
}

impl RawTarget {
    /// Empty slots are all-zero on the wire.
    pub fn is_valid(&self) -> bool {
        *self != Self::default()
    }
}

pub type RawFrame = [RawTarget; TARGET_SLOTS];

fn decode_signed(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 { magnitude } else { -magnitude }
}

fn decode_target(b: &[u8]) -> RawTarget {
    let word = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
    RawTarget {
        x_mm: decode_signed(word(0)),
        y_mm: decode_signed(word(2)),
        speed_cm_s: decode_signed(word(4)),
        resolution_mm: word(6),
    }
}

/// Encode a signed value the way the sensor does.  Used by tests and the
/// host simulation.
pub fn encode_signed(v: i16) -> u16 {
    let magnitude = v.unsigned_abs() & 0x7FFF;
    if v >= 0 { magnitude | 0x8000 } else { magnitude }
}

/// Build a complete wire frame.
pub fn encode_frame(targets: &RawFrame) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[..4].copy_from_slice(&HEADER);
    for (i, t) in targets.iter().enumerate() {
        let base = 4 + i * TARGET_LEN;
        if !t.is_valid() {
            continue;
        }
        out[base..base + 2].copy_from_slice(&encode_signed(t.x_mm).to_le_bytes());
        out[base + 2..base + 4].copy_from_slice(&encode_signed(t.y_mm).to_le_bytes());
        out[base + 4..base + 6].copy_from_slice(&encode_signed(t.speed_cm_s).to_le_bytes());
        out[base + 6..base + 8].copy_from_slice(&t.resolution_mm.to_le_bytes());
    }
    out[FRAME_LEN - 2..].copy_from_slice(&TAIL);
    out
}

#[derive(Default)]
pub struct Ld2450Parser {
    buf: heapless::Vec<u8, FRAME_LEN>,
}

impl Ld2450Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte.  Yields a frame when one completes, or a
    /// [`MalformedFrame::Radar`] when a synced frame has a bad tail.
    pub fn push(&mut self, byte: u8) -> Option<Result<RawFrame, MalformedFrame>> {
        let pos = self.buf.len();
        if pos < HEADER.len() {
            if byte == HEADER[pos] {
                let _ = self.buf.push(byte);
            } else {
                self.buf.clear();
                if byte == HEADER[0] {
                    let _ = self.buf.push(byte);
                }
            }
            return None;
        }

        let _ = self.buf.push(byte);
        if self.buf.len() < FRAME_LEN {
            return None;
        }

        let frame = &self.buf[..];
        let result = if frame[FRAME_LEN - 2..] == TAIL {
            let mut targets = RawFrame::default();
            for (i, t) in targets.iter_mut().enumerate() {
                let base = HEADER.len() + i * TARGET_LEN;
                *t = decode_target(&frame[base..base + TARGET_LEN]);
            }
            Ok(targets)
        } else {
            Err(MalformedFrame::Radar)
        };
        self.buf.clear();
        Some(result)
    }

    /// Feed a slice, collecting every completed frame outcome.
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_frame: F)
    where
        F: FnMut(Result<RawFrame, MalformedFrame>),
    {
        for &b in bytes {
            if let Some(r) = self.push(b) {
                on_frame(r);
            }
        }
    }
}
