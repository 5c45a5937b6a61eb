//! Peer frame codec.
//!
//! Frames are compact JSON objects tagged by a `"msg"` field.  Inbound
//! kinds come from nodes; outbound kinds are built by the coordinator.
//! Anything that fails to decode is a [`MalformedFrame::Peer`].

use serde::{Deserialize, Serialize};

use crate::app::commands::NodeCommand;
use crate::error::{LinkError, MalformedFrame};
use crate::events::MAX_FRAME_LEN;
use crate::registry::{ActuatorId, NodeId};

pub type ShortText = heapless::String<16>;
pub type CommandId = heapless::String<24>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum PeerMessage {
    // ── node → coordinator ────────────────────────────────
    #[serde(alias = "tower_join_request")]
    JoinRequest(JoinRequest),
    NodeStatus(NodeStatus),
    TowerTelemetry(TowerTelemetry),
    Ack(NodeAck),
    Error(NodeFault),

    // ── coordinator → node ────────────────────────────────
    TowerJoinAccept(JoinAccept),
    TowerCommand(TowerCommand),
    SetLight(SetLight),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Nodes may propose their own id; otherwise one is derived from the MAC.
    #[serde(default, alias = "tower_id")]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub fw: ShortText,
    #[serde(default)]
    pub token: heapless::String<32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    #[serde(default)]
    pub light_id: Option<ActuatorId>,
    #[serde(default)]
    pub status_mode: ShortText,
    #[serde(default)]
    pub vbat_mv: u16,
    /// Light heatsink temperature, °C.
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub fw: ShortText,
    #[serde(default)]
    pub ts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerTelemetry {
    pub tower_id: NodeId,
    #[serde(default)]
    pub air_temp_c: Option<f32>,
    #[serde(default)]
    pub humidity_pct: Option<f32>,
    #[serde(default)]
    pub light_lux: Option<f32>,
    #[serde(default)]
    pub pump_on: bool,
    #[serde(default)]
    pub light_on: bool,
    #[serde(default)]
    pub light_brightness: u8,
    #[serde(default)]
    pub status_mode: ShortText,
    #[serde(default)]
    pub vbat_mv: u16,
    #[serde(default)]
    pub fw: ShortText,
    #[serde(default)]
    pub uptime_s: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAck {
    pub cmd_id: CommandId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFault {
    #[serde(default)]
    pub node_id: Option<NodeId>,
    pub code: ShortText,
    #[serde(default)]
    pub info: heapless::String<64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinAccept {
    pub tower_id: NodeId,
    pub coord_id: heapless::String<32>,
    pub farm_id: heapless::String<32>,
    pub wifi_channel: u8,
    pub cfg: JoinAcceptCfg,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoinAcceptCfg {
    pub telemetry_interval_ms: u32,
}

/// Actuation command for a tower node.  Only the fields relevant to
/// `command` are present on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TowerCommand {
    pub tower_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_id: Option<CommandId>,
    pub command: ShortText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duty: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump_duration_s: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_duration_m: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_mm: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_profile: Option<heapless::String<24>>,
    pub ttl_ms: u16,
}

/// Light output level for a node (`value` is duty, 0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLight {
    pub light_id: ActuatorId,
    pub value: u8,
    #[serde(default)]
    pub fade_ms: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ShortText>,
}

const COMMAND_TTL_MS: u16 = 1500;

fn short(s: &str) -> ShortText {
    let mut out = ShortText::new();
    let _ = out.push_str(s);
    out
}

impl TowerCommand {
    pub fn new(tower_id: NodeId, cmd_id: Option<CommandId>, command: &NodeCommand) -> Self {
        let mut out = Self {
            tower_id,
            cmd_id,
            command: short(command.name()),
            ttl_ms: COMMAND_TTL_MS,
            ..Self::default()
        };
        match command {
            NodeCommand::SetDuty(duty) => out.duty = Some(*duty),
            NodeCommand::SetLight {
                on,
                brightness,
                duration_m,
            } => {
                out.light_on = Some(*on);
                out.light_brightness = Some(*brightness);
                out.light_duration_m = Some(*duration_m);
            }
            NodeCommand::SetPump { on, duration_s } => {
                out.pump_on = Some(*on);
                out.pump_duration_s = Some(*duration_s);
            }
            NodeCommand::SetHeight(mm) => out.height_mm = Some(*mm),
            NodeCommand::SetCropProfile(profile) => out.crop_profile = Some(profile.clone()),
            NodeCommand::Reboot => {}
        }
        out
    }
}

impl SetLight {
    pub fn new(light_id: ActuatorId, value: u8, reason: &str) -> Self {
        Self {
            light_id,
            value,
            fade_ms: 0,
            reason: Some(short(reason)),
        }
    }
}

impl PeerMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, MalformedFrame> {
        serde_json::from_slice(bytes).map_err(|_| MalformedFrame::Peer)
    }

    pub fn encode(&self) -> Result<Vec<u8>, LinkError> {
        let bytes = serde_json::to_vec(self).map_err(|_| LinkError::PayloadTooLarge)?;
        if bytes.len() > MAX_FRAME_LEN {
            return Err(LinkError::PayloadTooLarge);
        }
        Ok(bytes)
    }

    /// Node id the sender claims for itself, if the frame carries one.
    pub fn claimed_node_id(&self) -> Option<&str> {
        match self {
            Self::JoinRequest(j) => j.node_id.as_deref(),
            Self::NodeStatus(s) => Some(s.node_id.as_str()),
            Self::TowerTelemetry(t) => Some(t.tower_id.as_str()),
            Self::Error(e) => e.node_id.as_deref(),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRequest(_) => "join_request",
            Self::NodeStatus(_) => "node_status",
            Self::TowerTelemetry(_) => "tower_telemetry",
            Self::Ack(_) => "ack",
            Self::Error(_) => "error",
            Self::TowerJoinAccept(_) => "tower_join_accept",
            Self::TowerCommand(_) => "tower_command",
            Self::SetLight(_) => "set_light",
        }
    }
}
