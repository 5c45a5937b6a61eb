//! Per-node thermal deration.
//!
//! Each node sits on a step `k` in `0..=thresholds.len()`; its output
//! ceiling is `100 - k * step_pct`.  One sample moves at most one step:
//!
//! ```text
//!   temp > thresholds[k]               → k + 1   (derate)
//!   temp < thresholds[k-1] - hyst      → k - 1   (recover)
//!   otherwise                          → k
//! ```
//!
//! A [`ThermalEvent`] is produced only when `k` changes.

use log::{info, warn};

use crate::config::{MAX_PEERS, ThermalConfig};
use crate::registry::{FULL_OUTPUT, NodeId};

/// Raw input: one temperature reading from one node.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub node_id: NodeId,
    pub temperature_c: f32,
    pub timestamp_ms: u64,
}

/// Emitted on every deration level change.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalEvent {
    pub node_id: NodeId,
    pub temperature_c: f32,
    pub is_derated: bool,
    pub deration_level: u8,
    pub timestamp_ms: u64,
}

pub struct ThermalControl {
    cfg: ThermalConfig,
    steps: heapless::LinearMap<NodeId, u8, MAX_PEERS>,
}

impl ThermalControl {
    pub fn new(cfg: &ThermalConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            steps: heapless::LinearMap::new(),
        }
    }

    pub fn set_hysteresis(&mut self, hysteresis_c: f32) {
        self.cfg.hysteresis_c = hysteresis_c;
    }

    fn level_for(&self, step: u8) -> u8 {
        FULL_OUTPUT.saturating_sub(step.saturating_mul(self.cfg.step_pct))
    }

    /// Current deration level for a node; unknown nodes run at full output.
    pub fn level(&self, node_id: &str) -> u8 {
        self.steps
            .iter()
            .find(|(id, _)| id.as_str() == node_id)
            .map_or(FULL_OUTPUT, |(_, k)| self.level_for(*k))
    }

    /// Highest duty a node may be commanded to.
    pub fn ceiling(&self, node_id: &str) -> u8 {
        self.level(node_id)
    }

    /// Run one sample through the state machine.
    pub fn process(&mut self, sample: &SensorSample) -> Option<ThermalEvent> {
        if !sample.temperature_c.is_finite() {
            warn!("thermal: {} reported non-finite temperature", sample.node_id);
            return None;
        }

        let k = self.steps.get(&sample.node_id).copied().unwrap_or(0);
        let thresholds = &self.cfg.thresholds_c;
        let t = sample.temperature_c;
        let idx = usize::from(k);

        let next = if idx < thresholds.len() && t > thresholds[idx] {
            k + 1
        } else if idx > 0 && t < thresholds[idx - 1] - self.cfg.hysteresis_c {
            k - 1
        } else {
            k
        };

        if next == k {
            return None;
        }
        if next == 0 {
            self.steps.remove(&sample.node_id);
        } else if self.steps.insert(sample.node_id.clone(), next).is_err() {
            warn!("thermal: tracking table full, {} unprotected", sample.node_id);
            return None;
        }

        let level = self.level_for(next);
        info!(
            "thermal: {} {:.1}°C, level {} → {}",
            sample.node_id,
            t,
            self.level_for(k),
            level
        );
        Some(ThermalEvent {
            node_id: sample.node_id.clone(),
            temperature_c: t,
            is_derated: level < FULL_OUTPUT,
            deration_level: level,
            timestamp_ms: sample.timestamp_ms,
        })
    }

    /// Drop state for an unpaired node.
    pub fn forget(&mut self, node_id: &str) {
        let key = self
            .steps
            .keys()
            .find(|id| id.as_str() == node_id)
            .cloned();
        if let Some(key) = key {
            self.steps.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}
