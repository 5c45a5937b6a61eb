//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per
//! [`AppEvent`] to the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { nodes } => info!("START | nodes={nodes}"),
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | lux={:?} T={:?}\u{00b0}C | radar presence={} conf={:.2} online={} | \
                     wifi={} rssi={:?}",
                    t.light_lux,
                    t.temperature_c,
                    t.radar_presence,
                    t.radar_confidence,
                    t.radar_online,
                    t.wifi_connected,
                    t.wifi_rssi,
                );
            }
            AppEvent::LinkChanged { from, to } => {
                info!("LINK  | {} -> {}", from.as_str(), to.as_str());
            }
            AppEvent::PairingOpened { duration_ms } => info!("PAIR  | open {duration_ms} ms"),
            AppEvent::PairingClosed(reason) => info!("PAIR  | closed ({})", reason.as_str()),
            AppEvent::NodeAdmitted { node_id } => info!("PAIR  | admitted {node_id}"),
            AppEvent::PairingRejected { addr, reason } => {
                warn!("PAIR  | rejected {:02X?}: {}", addr, reason);
            }
            AppEvent::NodeRemoved { node_id } => info!("NODE  | removed {node_id}"),
            AppEvent::Thermal(e) => {
                info!(
                    "THERM | {} {:.1}\u{00b0}C level={} derated={}",
                    e.node_id, e.temperature_c, e.deration_level, e.is_derated
                );
            }
            AppEvent::ZoneChanged { zone_id, occupied } => {
                info!("ZONE  | {} {}", zone_id, if *occupied { "occupied" } else { "vacant" });
            }
            AppEvent::CommandFailed { command, reason } => {
                warn!("CMD   | {command} refused: {reason}");
            }
        }
    }
}
