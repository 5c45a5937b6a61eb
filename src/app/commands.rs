//! Commands the coordinator accepts from the uplink and from local inputs.

use crate::config::WifiCredentials;
use crate::registry::NodeId;

/// Actuation forwarded to one node over the peer radio.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeCommand {
    /// Output duty, 0-100.  Clamped to the node's thermal ceiling.
    SetDuty(u8),
    SetLight {
        on: bool,
        brightness: u8,
        duration_m: u16,
    },
    SetPump {
        on: bool,
        duration_s: u16,
    },
    SetHeight(u16),
    SetCropProfile(heapless::String<24>),
    Reboot,
}

impl NodeCommand {
    /// Wire name used both in uplink payloads and peer frames.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetDuty(_) => "set_duty",
            Self::SetLight { .. } => "set_light",
            Self::SetPump { .. } => "set_pump",
            Self::SetHeight(_) => "set_height",
            Self::SetCropProfile(_) => "set_crop_profile",
            Self::Reboot => "reboot",
        }
    }
}

/// Runtime-tunable subset of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfigPatch {
    pub telemetry_interval_ms: Option<u32>,
    pub vacate_after_updates: Option<u8>,
    pub hysteresis_c: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Open the pairing window; `None` uses the configured default.
    OpenPairing { duration_ms: Option<u32> },
    ClosePairing,
    /// New Wi-Fi credentials.  Rejected while the link is up.
    Provision(WifiCredentials),
    Unpair(NodeId),
    UnpairAll,
    Node { node_id: NodeId, command: NodeCommand },
    UpdateConfig(ConfigPatch),
    /// Publish coordinator telemetry now.
    PublishStatus,
    /// Reservoir commands are routed but handled by a separate board.
    Reservoir,
}

impl AppCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenPairing { .. } => "pairing.start",
            Self::ClosePairing => "pairing.stop",
            Self::Provision(_) => "wifi.config",
            Self::Unpair(_) | Self::UnpairAll => "unpair",
            Self::Node { command, .. } => command.name(),
            Self::UpdateConfig(_) => "update_config",
            Self::PublishStatus => "status",
            Self::Reservoir => "reservoir",
        }
    }
}
