//! Zone occupancy from radar updates.
//!
//! A zone becomes occupied on the first update with a qualifying target and
//! is released only after `vacate_after_updates` consecutive updates without
//! one.  Radar dropouts of a frame or two therefore never toggle actuators.

use log::info;

use crate::config::{MAX_ZONES, ZoneConfig, ZoneMapping};
use crate::radar::{RadarEvent, RadarTarget};

pub type ZoneId = heapless::String<16>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ZoneState {
    occupied: bool,
    misses: u8,
}

/// One occupancy edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneTransition {
    pub zone_id: ZoneId,
    pub occupied: bool,
}

pub struct ZoneControl {
    zones: heapless::Vec<(ZoneMapping, ZoneState), MAX_ZONES>,
    vacate_after: u8,
}

fn qualifies(zone: &ZoneMapping, t: &RadarTarget) -> bool {
    t.valid && t.in_zone && zone.bounds.contains(i32::from(t.x_mm), i32::from(t.y_mm))
}

impl ZoneControl {
    pub fn new(cfg: &ZoneConfig) -> Self {
        let zones = cfg
            .zones
            .iter()
            .map(|z| (z.clone(), ZoneState::default()))
            .collect();
        Self {
            zones,
            vacate_after: cfg.vacate_after_updates.max(1),
        }
    }

    pub fn set_vacate_after(&mut self, updates: u8) {
        self.vacate_after = updates.max(1);
    }

    /// Recompute occupancy from one radar update.  Returns only the zones
    /// whose state changed.
    pub fn update(&mut self, event: &RadarEvent) -> heapless::Vec<ZoneTransition, MAX_ZONES> {
        let mut out = heapless::Vec::new();
        for (zone, state) in &mut self.zones {
            let hit = event.targets().iter().any(|t| qualifies(zone, t));
            let changed = if hit {
                state.misses = 0;
                !core::mem::replace(&mut state.occupied, true)
            } else if state.occupied {
                state.misses = state.misses.saturating_add(1);
                if state.misses >= self.vacate_after {
                    state.occupied = false;
                    state.misses = 0;
                    true
                } else {
                    false
                }
            } else {
                false
            };

            if changed {
                info!(
                    "zone {}: {}",
                    zone.zone_id,
                    if state.occupied { "occupied" } else { "vacant" }
                );
                let _ = out.push(ZoneTransition {
                    zone_id: zone.zone_id.clone(),
                    occupied: state.occupied,
                });
            }
        }
        out
    }

    pub fn is_occupied(&self, zone_id: &str) -> Option<bool> {
        self.zones
            .iter()
            .find(|(z, _)| z.zone_id == zone_id)
            .map(|(_, s)| s.occupied)
    }

    pub fn mapping(&self, zone_id: &str) -> Option<&ZoneMapping> {
        self.zones
            .iter()
            .find(|(z, _)| z.zone_id == zone_id)
            .map(|(z, _)| z)
    }

    /// `(zone id, occupied)` for every configured zone.
    pub fn occupancy(&self) -> impl Iterator<Item = (&str, bool)> {
        self.zones.iter().map(|(z, s)| (z.zone_id.as_str(), s.occupied))
    }
}
