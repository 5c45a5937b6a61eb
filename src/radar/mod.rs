//! mmWave radar driver.
//!
//! Pulls bytes from a [`RadarPort`], runs them through the LD2450 parser and
//! turns each frame into a [`RadarEvent`] with derived velocity and
//! per-target zone membership.

pub mod ld2450;

use log::{debug, info, warn};

use crate::app::ports::RadarPort;
use crate::config::{Bounds, RadarConfig};
use crate::diagnostics::Counters;

use ld2450::{Ld2450Parser, RawFrame, RawTarget};

/// Most slots any supported sensor reports.
pub const MAX_TARGETS: usize = 4;

/// One target slot.  Position fields are meaningful only when `valid`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RadarTarget {
    /// 1-based slot id.
    pub id: u8,
    pub valid: bool,
    pub x_mm: i16,
    pub y_mm: i16,
    pub distance_mm: u16,
    pub speed_cm_s: i16,
    pub resolution_mm: u16,
    pub vx_m_s: f32,
    pub vy_m_s: f32,
    pub in_zone: bool,
}

impl RadarTarget {
    /// Build a slot from sensor data, marking zone membership against
    /// `detection`.
    pub fn from_raw(id: u8, raw: &RawTarget, detection: &Bounds) -> Self {
        let valid = raw.is_valid();
        if !valid {
            return Self {
                id,
                ..Self::default()
            };
        }
        let x = f32::from(raw.x_mm);
        let y = f32::from(raw.y_mm);
        Self {
            id,
            valid,
            x_mm: raw.x_mm,
            y_mm: raw.y_mm,
            distance_mm: (x * x + y * y).sqrt() as u16,
            speed_cm_s: raw.speed_cm_s,
            resolution_mm: raw.resolution_mm,
            vx_m_s: 0.0,
            vy_m_s: 0.0,
            in_zone: detection.contains(i32::from(raw.x_mm), i32::from(raw.y_mm)),
        }
    }
}

/// One radar update.  The target list has fixed length equal to the
/// sensor's slot capacity; `confidence` is always the valid fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarEvent {
    sensor_id: heapless::String<16>,
    timestamp_ms: u64,
    targets: heapless::Vec<RadarTarget, MAX_TARGETS>,
    presence: bool,
    zone_occupied: bool,
    confidence: f32,
}

impl RadarEvent {
    pub fn new(
        sensor_id: &str,
        timestamp_ms: u64,
        targets: heapless::Vec<RadarTarget, MAX_TARGETS>,
    ) -> Self {
        let valid = targets.iter().filter(|t| t.valid).count();
        let confidence = if targets.is_empty() {
            0.0
        } else {
            valid as f32 / targets.len() as f32
        };
        let mut id = heapless::String::new();
        let _ = id.push_str(sensor_id);
        Self {
            sensor_id: id,
            timestamp_ms,
            presence: valid > 0,
            zone_occupied: targets.iter().any(|t| t.valid && t.in_zone),
            targets,
            confidence,
        }
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn targets(&self) -> &[RadarTarget] {
        &self.targets
    }

    pub fn capacity(&self) -> usize {
        self.targets.len()
    }

    pub fn valid_count(&self) -> usize {
        self.targets.iter().filter(|t| t.valid).count()
    }

    pub fn presence(&self) -> bool {
        self.presence
    }

    pub fn zone_occupied(&self) -> bool {
        self.zone_occupied
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

const READ_CHUNK: usize = 64;
/// Bytes consumed per poll; a 30-byte frame arrives every ~100 ms.
const READ_BUDGET: usize = 256;

pub struct RadarDriver<U: RadarPort> {
    port: U,
    parser: Ld2450Parser,
    cfg: RadarConfig,
    prev: Option<(u64, RawFrame)>,
    last_frame_ms: Option<u64>,
    online: bool,
}

impl<U: RadarPort> RadarDriver<U> {
    pub fn new(port: U, cfg: &RadarConfig) -> Self {
        Self {
            port,
            parser: Ld2450Parser::new(),
            cfg: cfg.clone(),
            prev: None,
            last_frame_ms: None,
            online: false,
        }
    }

    pub fn port_mut(&mut self) -> &mut U {
        &mut self.port
    }

    /// Frames seen within `stale_after_ms`.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Read what the UART has buffered.  Returns the newest complete event,
    /// if any.  Bad frames are counted and skipped.
    pub fn poll(&mut self, now_ms: u64, counters: &mut Counters) -> Option<RadarEvent> {
        let mut latest: Option<RawFrame> = None;
        let mut chunk = [0u8; READ_CHUNK];
        let mut consumed = 0;

        while consumed < READ_BUDGET {
            let n = self.port.read(&mut chunk);
            if n == 0 {
                break;
            }
            consumed += n;
            self.parser.feed(&chunk[..n], |r| match r {
                Ok(frame) => latest = Some(frame),
                Err(e) => counters.malformed(e),
            });
        }

        let event = latest.map(|frame| self.build_event(now_ms, &frame));
        if event.is_some() {
            self.last_frame_ms = Some(now_ms);
        }
        self.update_online(now_ms);
        event
    }

    fn update_online(&mut self, now_ms: u64) {
        let online = self
            .last_frame_ms
            .is_some_and(|t| now_ms.saturating_sub(t) <= u64::from(self.cfg.stale_after_ms));
        if online != self.online {
            if online {
                info!("radar: stream online");
            } else {
                warn!("radar: no frames for {} ms, offline", self.cfg.stale_after_ms);
            }
            self.online = online;
        }
    }

    fn build_event(&mut self, now_ms: u64, frame: &RawFrame) -> RadarEvent {
        let capacity = usize::from(self.cfg.capacity).clamp(1, MAX_TARGETS);
        let mut targets = heapless::Vec::<RadarTarget, MAX_TARGETS>::new();

        for slot in 0..capacity {
            let raw = frame.get(slot).copied().unwrap_or_default();
            let mut t = RadarTarget::from_raw(slot as u8 + 1, &raw, &self.cfg.detection);
            if let Some((prev_ms, prev)) = &self.prev {
                let dt = now_ms.saturating_sub(*prev_ms);
                let p = prev.get(slot).copied().unwrap_or_default();
                if t.valid && p.is_valid() && dt > 0 {
                    // mm per ms is m/s.
                    t.vx_m_s = (f32::from(raw.x_mm) - f32::from(p.x_mm)) / dt as f32;
                    t.vy_m_s = (f32::from(raw.y_mm) - f32::from(p.y_mm)) / dt as f32;
                }
            }
            let _ = targets.push(t);
        }
        self.prev = Some((now_ms, *frame));

        let event = RadarEvent::new(&self.cfg.sensor_id, now_ms, targets);
        debug!(
            "radar: {} valid, confidence {:.2}, zone {}",
            event.valid_count(),
            event.confidence(),
            event.zone_occupied()
        );
        event
    }
}
