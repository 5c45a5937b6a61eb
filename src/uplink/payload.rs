//! JSON payloads on the broker side.
//!
//! Outbound structs only ever gain fields.  Inbound commands are parsed
//! into [`AppCommand`]s; anything that is not a JSON object with a `cmd`
//! string is a [`MalformedFrame::Command`].

use serde::{Deserialize, Serialize};

use super::topics::Route;
use crate::app::commands::{AppCommand, ConfigPatch, NodeCommand};
use crate::app::events::CoordinatorSnapshot;
use crate::config::WifiCredentials;
use crate::diagnostics::Counters;
use crate::error::MalformedFrame;
use crate::radar::RadarEvent;
use crate::radio::frame::{NodeStatus, TowerTelemetry};
use crate::registry::{NodeId, NodeInfo};
use crate::thermal::ThermalEvent;

/// Seconds since boot, the unit every `ts` field uses.
pub fn ts(now_ms: u64) -> u64 {
    now_ms / 1000
}

// ───────────────────────────────────────────────────────────────
// Outbound
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CoordinatorTelemetryPayload<'a> {
    pub ts: u64,
    pub farm_id: &'a str,
    pub coord_id: &'a str,
    pub light_lux: Option<f32>,
    pub temp_c: Option<f32>,
    /// -127 while disconnected.
    pub wifi_rssi: i16,
    pub wifi_connected: bool,
    pub mmwave_presence: bool,
    pub mmwave_confidence: f32,
    pub mmwave_online: bool,
    pub nodes: usize,
    pub stale_nodes: usize,
    pub diag: Counters,
}

impl<'a> CoordinatorTelemetryPayload<'a> {
    pub fn new(
        farm_id: &'a str,
        coord_id: &'a str,
        snap: &CoordinatorSnapshot,
        nodes: usize,
        stale_nodes: usize,
        diag: Counters,
    ) -> Self {
        Self {
            ts: ts(snap.timestamp_ms),
            farm_id,
            coord_id,
            light_lux: snap.light_lux,
            temp_c: snap.temperature_c,
            wifi_rssi: snap.wifi_rssi.map_or(-127, i16::from),
            wifi_connected: snap.wifi_connected,
            mmwave_presence: snap.radar_presence,
            mmwave_confidence: snap.radar_confidence,
            mmwave_online: snap.radar_online,
            nodes,
            stale_nodes,
            diag,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TowerTelemetryPayload<'a> {
    pub ts: u64,
    pub farm_id: &'a str,
    pub coord_id: &'a str,
    pub tower_id: &'a str,
    pub air_temp_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub light_lux: Option<f32>,
    pub pump_on: bool,
    pub light_on: bool,
    pub light_brightness: u8,
    pub status_mode: &'a str,
    pub vbat_mv: u16,
    pub fw: &'a str,
    pub uptime_s: u32,
}

impl<'a> TowerTelemetryPayload<'a> {
    pub fn new(
        farm_id: &'a str,
        coord_id: &'a str,
        node_id: &'a str,
        t: &'a TowerTelemetry,
        now_ms: u64,
    ) -> Self {
        Self {
            ts: ts(now_ms),
            farm_id,
            coord_id,
            tower_id: node_id,
            air_temp_c: t.air_temp_c,
            humidity_pct: t.humidity_pct,
            light_lux: t.light_lux,
            pump_on: t.pump_on,
            light_on: t.light_on,
            light_brightness: t.light_brightness,
            status_mode: if t.status_mode.is_empty() { "idle" } else { &t.status_mode },
            vbat_mv: t.vbat_mv,
            fw: &t.fw,
            uptime_s: t.uptime_s,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TowerStatusPayload<'a> {
    pub ts: u64,
    pub node_id: &'a str,
    pub light_id: &'a str,
    pub status_mode: &'a str,
    pub vbat_mv: u16,
    pub temp_c: Option<f32>,
    pub fw: &'a str,
    pub last_duty: u8,
    pub is_derated: bool,
    pub deration_level: u8,
    pub stale: bool,
}

impl<'a> TowerStatusPayload<'a> {
    pub fn new(node: &'a NodeInfo, status: &'a NodeStatus, stale: bool, now_ms: u64) -> Self {
        Self {
            ts: ts(now_ms),
            node_id: &node.node_id,
            light_id: status.light_id.as_deref().unwrap_or(&node.actuator_id),
            status_mode: if status.status_mode.is_empty() { "idle" } else { &status.status_mode },
            vbat_mv: status.vbat_mv,
            temp_c: status.temperature,
            fw: &status.fw,
            last_duty: node.last_duty,
            is_derated: node.is_derated,
            deration_level: node.deration_level,
            stale,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ThermalPayload<'a> {
    pub ts: u64,
    pub node_id: &'a str,
    pub temp_c: f32,
    pub is_derated: bool,
    pub deration_level: u8,
}

impl<'a> From<&'a ThermalEvent> for ThermalPayload<'a> {
    fn from(e: &'a ThermalEvent) -> Self {
        Self {
            ts: ts(e.timestamp_ms),
            node_id: &e.node_id,
            temp_c: e.temperature_c,
            is_derated: e.is_derated,
            deration_level: e.deration_level,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TargetPayload {
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

#[derive(Debug, Serialize)]
pub struct MmwavePayload<'a> {
    pub ts: u64,
    pub sensor_id: &'a str,
    pub presence: bool,
    pub confidence: f32,
    pub zone_occupied: bool,
    pub targets: Vec<TargetPayload>,
}

impl<'a> From<&'a RadarEvent> for MmwavePayload<'a> {
    fn from(e: &'a RadarEvent) -> Self {
        Self {
            ts: ts(e.timestamp_ms()),
            sensor_id: e.sensor_id(),
            presence: e.presence(),
            confidence: e.confidence(),
            zone_occupied: e.zone_occupied(),
            targets: e
                .targets()
                .iter()
                .map(|t| TargetPayload {
                    id: t.id,
                    valid: t.valid,
                    x_mm: t.x_mm,
                    y_mm: t.y_mm,
                    distance_mm: t.distance_mm,
                    speed_cm_s: t.speed_cm_s,
                    resolution_mm: t.resolution_mm,
                    vx_m_s: t.vx_m_s,
                    vy_m_s: t.vy_m_s,
                    in_zone: t.in_zone,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PairingStatusPayload<'a> {
    pub ts: u64,
    /// `window_opened`, `node_admitted`, `node_rejected` or `window_closed`.
    pub event: &'a str,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
    pub nodes: usize,
}

#[derive(Debug, Serialize)]
pub struct PairingCompletePayload<'a> {
    pub ts: u64,
    pub reason: &'a str,
    pub nodes: usize,
}

#[derive(Debug, Serialize)]
pub struct ConnectionPayload<'a> {
    pub ts: u64,
    pub farm_id: &'a str,
    pub coord_id: &'a str,
    /// `online` or `offline`.
    pub status: &'a str,
    pub event: &'a str,
    pub wifi_connected: bool,
    pub wifi_rssi: i16,
    pub mqtt_connected: bool,
    pub uptime_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct AckPayload<'a> {
    pub cmd: &'a str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd_id: Option<&'a str>,
}

// ───────────────────────────────────────────────────────────────
// Inbound
// ───────────────────────────────────────────────────────────────

pub type CommandName = heapless::String<24>;

#[derive(Debug, Deserialize)]
struct RawConfigPatch {
    telemetry_interval_ms: Option<u32>,
    vacate_after_updates: Option<u8>,
    hysteresis_c: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    cmd: String,
    cmd_id: Option<String>,
    duration_ms: Option<u32>,
    ssid: Option<String>,
    password: Option<String>,
    node_id: Option<String>,
    #[serde(default)]
    all: bool,
    duty: Option<u8>,
    on: Option<bool>,
    brightness: Option<u8>,
    duration_m: Option<u16>,
    duration_s: Option<u16>,
    height_mm: Option<u16>,
    profile: Option<String>,
    config: Option<RawConfigPatch>,
}

/// A command that parsed far enough to be acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    /// Lowercased `cmd` field, echoed in the ack.
    pub name: CommandName,
    pub cmd_id: Option<heapless::String<24>>,
    pub node_id: Option<NodeId>,
    /// `Err` carries the nack reason.
    pub command: Result<AppCommand, &'static str>,
}

fn bounded<const N: usize>(s: &str) -> Option<heapless::String<N>> {
    let mut out = heapless::String::new();
    out.push_str(s).ok()?;
    Some(out)
}

/// Parse one inbound command.  `Err` means the payload was not even a
/// command object and is dropped without an ack.
pub fn parse_command(route: Route<'_>, payload: &[u8]) -> Result<ParsedCommand, MalformedFrame> {
    let raw: RawCommand = serde_json::from_slice(payload).map_err(|_| MalformedFrame::Command)?;
    let lower = raw.cmd.trim().to_ascii_lowercase();
    let name = bounded::<24>(&lower).ok_or(MalformedFrame::Command)?;
    let cmd_id = raw.cmd_id.as_deref().and_then(bounded::<24>);

    let (node_id, command) = match route {
        Route::Coordinator => {
            let node_id = raw.node_id.as_deref().and_then(bounded::<24>);
            (node_id, coordinator_command(&lower, &raw))
        }
        Route::Tower(id) => match bounded::<24>(id) {
            Some(node_id) => {
                let command = node_command(&lower, &raw).map(|command| AppCommand::Node {
                    node_id: node_id.clone(),
                    command,
                });
                (Some(node_id), command)
            }
            None => (None, Err("node id too long")),
        },
        Route::Reservoir => (None, Ok(AppCommand::Reservoir)),
    };

    Ok(ParsedCommand {
        name,
        cmd_id,
        node_id,
        command,
    })
}

fn coordinator_command(cmd: &str, raw: &RawCommand) -> Result<AppCommand, &'static str> {
    match cmd {
        "pair" | "pairing.start" | "enter_pairing_mode" => Ok(AppCommand::OpenPairing {
            duration_ms: raw.duration_ms,
        }),
        "pairing.stop" => Ok(AppCommand::ClosePairing),
        "wifi.config" | "wifi_config" => {
            let ssid = raw.ssid.as_deref().ok_or("missing ssid")?;
            let password = raw.password.as_deref().unwrap_or("");
            WifiCredentials::new(ssid, password)
                .map(AppCommand::Provision)
                .map_err(|_| "invalid credentials")
        }
        "unpair" if raw.all => Ok(AppCommand::UnpairAll),
        "unpair" => {
            let id = raw.node_id.as_deref().ok_or("missing node_id")?;
            bounded::<24>(id).map(AppCommand::Unpair).ok_or("node id too long")
        }
        "status" => Ok(AppCommand::PublishStatus),
        "update_config" => {
            let patch = raw.config.as_ref().ok_or("missing config")?;
            let patch = ConfigPatch {
                telemetry_interval_ms: patch.telemetry_interval_ms,
                vacate_after_updates: patch.vacate_after_updates,
                hysteresis_c: patch.hysteresis_c,
            };
            if patch == ConfigPatch::default() {
                return Err("empty config");
            }
            Ok(AppCommand::UpdateConfig(patch))
        }
        _ => Err("unknown command"),
    }
}

fn node_command(cmd: &str, raw: &RawCommand) -> Result<NodeCommand, &'static str> {
    match cmd {
        "set_duty" => {
            let duty = raw.duty.ok_or("missing duty")?;
            if duty > 100 {
                return Err("duty out of range");
            }
            Ok(NodeCommand::SetDuty(duty))
        }
        "set_light" => Ok(NodeCommand::SetLight {
            on: raw.on.unwrap_or(true),
            brightness: raw.brightness.unwrap_or(100),
            duration_m: raw.duration_m.unwrap_or(0),
        }),
        "set_pump" => Ok(NodeCommand::SetPump {
            on: raw.on.ok_or("missing on")?,
            duration_s: raw.duration_s.unwrap_or(0),
        }),
        "set_height" => raw
            .height_mm
            .map(NodeCommand::SetHeight)
            .ok_or("missing height_mm"),
        "set_crop_profile" => {
            let p = raw.profile.as_deref().ok_or("missing profile")?;
            bounded::<24>(p)
                .map(NodeCommand::SetCropProfile)
                .ok_or("profile too long")
        }
        "reboot" => Ok(NodeCommand::Reboot),
        _ => Err("unknown command"),
    }
}
