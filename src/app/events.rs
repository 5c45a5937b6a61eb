//! Outbound application events.
//!
//! The [`Coordinator`](super::coordinator::Coordinator) emits these through
//! the [`EventSink`](super::ports::EventSink) port on state edges only.
//! Adapters on the other side decide what to do with them.

use crate::error::RegistryError;
use crate::link::LinkState;
use crate::radio::pairing::CloseReason;
use crate::registry::{MacAddress, NodeId};
use crate::thermal::ThermalEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Boot finished; carries the number of restored nodes.
    Started { nodes: usize },

    /// Periodic coordinator telemetry snapshot.
    Telemetry(CoordinatorSnapshot),

    LinkChanged { from: LinkState, to: LinkState },

    PairingOpened { duration_ms: u32 },
    PairingClosed(CloseReason),
    NodeAdmitted { node_id: NodeId },
    PairingRejected { addr: MacAddress, reason: RegistryError },
    NodeRemoved { node_id: NodeId },

    /// A node's deration level changed.
    Thermal(ThermalEvent),

    ZoneChanged {
        zone_id: heapless::String<16>,
        occupied: bool,
    },

    /// A command was refused; the same reason goes out in the ack.
    CommandFailed {
        command: heapless::String<24>,
        reason: &'static str,
    },
}

/// The coordinator's own composite telemetry.  Read-only once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSnapshot {
    pub light_lux: Option<f32>,
    pub temperature_c: Option<f32>,
    pub radar_presence: bool,
    pub radar_confidence: f32,
    pub radar_online: bool,
    /// dBm; `None` while the uplink is down.
    pub wifi_rssi: Option<i8>,
    pub wifi_connected: bool,
    pub timestamp_ms: u64,
}
