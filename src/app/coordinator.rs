//! Coordinator: the hexagonal core.
//!
//! [`Coordinator`] owns one instance of every component and wires their
//! outputs together.  Hardware reaches it only through the port types of a
//! [`Platform`], so the whole tick runs on the host against mocks.
//!
//! One [`tick`](Coordinator::tick) runs the pumps in a fixed order:
//!
//! ```text
//!  radio drain ─▶ peer reconcile ─▶ radar/zones ─▶ thermal ─▶ uplink ─▶ link
//!      │                               │             │          ▲
//!      └── status temps ───────────────┼─────────────┘          │
//!                                      └── set_light ──▶ nodes  │
//!                                   every event ────────────────┘
//! ```
//!
//! Nothing in a tick blocks and no component error escapes it: failures are
//! logged, counted in [`Counters`] and the next pump runs regardless.

use core::fmt::Write;

use log::{debug, info, warn};

use crate::config::{self, CoordinatorConfig};
use crate::diagnostics::Counters;
use crate::error::{LinkError, RadioConfigError, RegistryError};
use crate::link::{LinkManager, LinkState, ProvisionError};
use crate::radar::{RadarDriver, RadarEvent};
use crate::radio::frame::{
    CommandId, JoinAccept, JoinAcceptCfg, NodeStatus, PeerMessage, SetLight, TowerCommand,
};
use crate::radio::pairing::CloseReason;
use crate::radio::{DRAIN_BUDGET, PeerRadio, RadioEvent};
use crate::registry::{NodeId, NodeRegistry};
use crate::thermal::{SensorSample, ThermalControl};
use crate::uplink::UplinkBridge;
use crate::uplink::payload::{
    self, AckPayload, CoordinatorTelemetryPayload, MmwavePayload, ParsedCommand,
    PairingCompletePayload, PairingStatusPayload, ThermalPayload, TowerStatusPayload,
    TowerTelemetryPayload,
};
use crate::uplink::topics::MessageKind;
use crate::zones::ZoneControl;

use super::commands::{AppCommand, ConfigPatch, NodeCommand};
use super::events::{AppEvent, CoordinatorSnapshot};
use super::ports::{AmbientPort, ConfigError, EventSink, Platform};

/// Pending config edits are flushed this long after the first one.
const CONFIG_SAVE_DEBOUNCE_MS: u64 = 5_000;
/// Radar frames arrive at ~10 Hz; publish at most this often unless a
/// zone changed.
const MMWAVE_PUBLISH_MS: u64 = 1_000;

/// The concrete adapters handed over at boot.
pub struct Peripherals<P: Platform> {
    pub radio: P::Radio,
    pub wifi: P::Wifi,
    pub broker: P::Broker,
    pub radar: P::Radar,
    pub ambient: P::Ambient,
    pub storage: P::Storage,
}

pub struct Coordinator<P: Platform> {
    cfg: CoordinatorConfig,
    registry: NodeRegistry,
    radio: PeerRadio<P::Radio>,
    link: LinkManager<P::Wifi>,
    uplink: UplinkBridge<P::Broker>,
    radar: RadarDriver<P::Radar>,
    zones: ZoneControl,
    thermal: ThermalControl,
    ambient: P::Ambient,
    storage: P::Storage,
    counters: Counters,
    presence: bool,
    confidence: f32,
    next_telemetry_ms: u64,
    next_mmwave_ms: u64,
    config_dirty_since: Option<u64>,
}

impl<P: Platform> Coordinator<P> {
    /// Build every component from `cfg`.  Nothing touches hardware until
    /// [`begin`](Self::begin).
    pub fn new(cfg: CoordinatorConfig, hw: Peripherals<P>) -> Self {
        Self {
            registry: NodeRegistry::new(usize::from(cfg.radio.max_peers)),
            radio: PeerRadio::new(hw.radio, &cfg.pairing),
            link: LinkManager::new(hw.wifi, &cfg.link),
            uplink: UplinkBridge::new(hw.broker, &cfg.identity, &cfg.broker),
            radar: RadarDriver::new(hw.radar, &cfg.radar),
            zones: ZoneControl::new(&cfg.zones),
            thermal: ThermalControl::new(&cfg.thermal),
            ambient: hw.ambient,
            storage: hw.storage,
            counters: Counters::default(),
            presence: false,
            confidence: 0.0,
            next_telemetry_ms: 0,
            next_mmwave_ms: 0,
            config_dirty_since: None,
            cfg,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the registry, bring the radio up with every restored peer,
    /// and start the link.  A radio configuration error is fatal.
    pub fn begin(
        &mut self,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), RadioConfigError> {
        if let Err(e) = self.registry.restore(&self.storage, now_ms) {
            warn!("registry: restore failed: {e}");
        }
        self.radio.configure(&self.cfg.radio)?;
        let report = self.radio.reconcile(&self.registry);
        info!("radio: {} peer(s) restored", report.added);

        self.link.restore_credentials(&self.storage);
        if let Some((from, to)) = self.link.start(now_ms) {
            self.link_changed(from, to, sink);
        }
        self.next_telemetry_ms = now_ms + u64::from(self.cfg.telemetry.coordinator_interval_ms);

        sink.emit(&AppEvent::Started {
            nodes: self.registry.len(),
        });
        info!(
            "coordinator {} / {} started, {} node(s)",
            self.cfg.identity.farm_id,
            self.cfg.identity.coord_id,
            self.registry.len()
        );
        Ok(())
    }

    /// Run one pass of every pump.
    pub fn tick(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        let samples = self.pump_radio(now_ms, sink);

        let report = self.radio.reconcile(&self.registry);
        if report.added > 0 || report.removed > 0 {
            debug!("radio: reconcile +{} -{}", report.added, report.removed);
        }

        self.pump_radar(now_ms, sink);

        for sample in &samples {
            self.pump_thermal(sample, sink);
        }

        self.pump_uplink(now_ms, sink);

        if let Some((from, to)) = self.link.poll(now_ms) {
            self.link_changed(from, to, sink);
        }

        self.save_config_if_due(now_ms);
    }

    // ── Commands ──────────────────────────────────────────────

    /// Run a command from a local input (button, console).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), &'static str> {
        let name = cmd.name();
        let result = self.execute(cmd, None, now_ms, sink);
        if let Err(reason) = result {
            warn!("command '{name}' refused: {reason}");
            sink.emit(&AppEvent::CommandFailed {
                command: short_name(name),
                reason,
            });
        }
        result
    }

    fn dispatch(&mut self, parsed: ParsedCommand, now_ms: u64, sink: &mut impl EventSink) {
        let result = match parsed.command {
            Ok(cmd) => self.execute(cmd, parsed.cmd_id.as_deref(), now_ms, sink),
            Err(reason) => Err(reason),
        };
        if let Err(reason) = result {
            warn!("uplink: command '{}' refused: {}", parsed.name, reason);
            sink.emit(&AppEvent::CommandFailed {
                command: parsed.name.clone(),
                reason,
            });
        }
        let ack = AckPayload {
            cmd: &parsed.name,
            ok: result.is_ok(),
            reason: result.err(),
            node_id: parsed.node_id.as_deref(),
            cmd_id: parsed.cmd_id.as_deref(),
        };
        self.uplink.publish_ack(&ack, &mut self.counters);
    }

    fn execute(
        &mut self,
        cmd: AppCommand,
        cmd_id: Option<&str>,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), &'static str> {
        match cmd {
            AppCommand::OpenPairing { duration_ms } => {
                let duration = self.radio.open_pairing_window(now_ms, duration_ms);
                sink.emit(&AppEvent::PairingOpened {
                    duration_ms: duration,
                });
                self.publish_pairing_status("window_opened", now_ms, Some(duration), None, None);
                Ok(())
            }
            AppCommand::ClosePairing => {
                if self.radio.close_pairing_window() {
                    self.window_closed(CloseReason::Manual, now_ms, sink);
                }
                Ok(())
            }
            AppCommand::Provision(creds) => {
                match self.link.provision(creds, now_ms, &mut self.storage) {
                    Ok(edge) => {
                        if let Some((from, to)) = edge {
                            self.link_changed(from, to, sink);
                        }
                        Ok(())
                    }
                    Err(ProvisionError::LinkBusy) => Err("link busy"),
                    Err(ProvisionError::Storage(_)) => Err("storage failed"),
                }
            }
            AppCommand::Unpair(node_id) => self.unpair(node_id, sink),
            AppCommand::UnpairAll => {
                self.unpair_all(sink);
                Ok(())
            }
            AppCommand::Node { node_id, command } => {
                self.send_node_command(&node_id, cmd_id, command)
            }
            AppCommand::UpdateConfig(patch) => self.update_config(patch, now_ms),
            AppCommand::PublishStatus => {
                self.publish_telemetry(now_ms, sink);
                Ok(())
            }
            AppCommand::Reservoir => Err("unsupported"),
        }
    }

    fn unpair(&mut self, node_id: NodeId, sink: &mut impl EventSink) -> Result<(), &'static str> {
        match self.registry.remove(&node_id, &mut self.storage) {
            Ok(_) => {}
            Err(RegistryError::UnknownNode) => return Err("unknown node"),
            // Already gone from memory; the next successful write persists it.
            Err(e) => warn!("registry: unpair {} not persisted: {}", node_id, e),
        }
        self.thermal.forget(&node_id);
        self.radio.reconcile(&self.registry);
        sink.emit(&AppEvent::NodeRemoved { node_id });
        Ok(())
    }

    fn unpair_all(&mut self, sink: &mut impl EventSink) {
        let removed: Vec<NodeId> = self.registry.all().map(|n| n.node_id.clone()).collect();
        if let Err(e) = self.registry.clear(&mut self.storage) {
            warn!("registry: clear not persisted: {e}");
        }
        self.thermal.clear();
        self.radio.reconcile(&self.registry);
        for node_id in removed {
            sink.emit(&AppEvent::NodeRemoved { node_id });
        }
    }

    /// Forward an actuation to its node.  Duty and brightness are clamped
    /// to the node's thermal ceiling; the requested value is what gets
    /// remembered as last duty.
    fn send_node_command(
        &mut self,
        node_id: &str,
        cmd_id: Option<&str>,
        command: NodeCommand,
    ) -> Result<(), &'static str> {
        let tower_id = self
            .registry
            .lookup(node_id)
            .map(|n| n.node_id.clone())
            .ok_or("unknown node")?;
        let ceiling = self.thermal.ceiling(node_id);
        let (wire, requested) = match command {
            NodeCommand::SetDuty(duty) => (NodeCommand::SetDuty(duty.min(ceiling)), Some(duty)),
            NodeCommand::SetLight {
                on,
                brightness,
                duration_m,
            } => (
                NodeCommand::SetLight {
                    on,
                    brightness: brightness.min(ceiling),
                    duration_m,
                },
                Some(if on { brightness.min(100) } else { 0 }),
            ),
            other => (other, None),
        };

        let cmd_id = cmd_id.and_then(|id| {
            let mut out = CommandId::new();
            out.push_str(id).ok().map(|()| out)
        });
        let msg = PeerMessage::TowerCommand(TowerCommand::new(tower_id, cmd_id, &wire));
        if let Err(e) = self.radio.send_message(&self.registry, node_id, &msg) {
            self.counters.send_failures = self.counters.send_failures.saturating_add(1);
            warn!("radio: {} to {} failed: {}", wire.name(), node_id, e);
            return Err(match e {
                LinkError::UnknownPeer => "unknown node",
                LinkError::PayloadTooLarge => "payload too large",
                LinkError::RadioFailure => "send failed",
            });
        }
        if let Some(duty) = requested {
            if let Err(e) = self.registry.record_duty(node_id, duty, &mut self.storage) {
                warn!("registry: duty for {} not persisted: {}", node_id, e);
            }
        }
        Ok(())
    }

    fn update_config(&mut self, patch: ConfigPatch, now_ms: u64) -> Result<(), &'static str> {
        let mut next = self.cfg.clone();
        if let Some(v) = patch.telemetry_interval_ms {
            next.telemetry.coordinator_interval_ms = v;
        }
        if let Some(v) = patch.vacate_after_updates {
            next.zones.vacate_after_updates = v;
        }
        if let Some(v) = patch.hysteresis_c {
            next.thermal.hysteresis_c = v;
        }
        next.validate().map_err(|e| match e {
            ConfigError::ValidationFailed(msg) => msg,
            _ => "invalid config",
        })?;

        self.zones.set_vacate_after(next.zones.vacate_after_updates);
        self.thermal.set_hysteresis(next.thermal.hysteresis_c);
        self.next_telemetry_ms = now_ms + u64::from(next.telemetry.coordinator_interval_ms);
        self.cfg = next;
        if self.config_dirty_since.is_none() {
            self.config_dirty_since = Some(now_ms);
        }
        info!("config: updated at runtime, save pending");
        Ok(())
    }

    // ── Pumps ─────────────────────────────────────────────────

    fn pump_radio(
        &mut self,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> heapless::Vec<SensorSample, DRAIN_BUDGET> {
        let mut samples = heapless::Vec::new();
        let events = self.radio.drain(
            now_ms,
            &mut self.registry,
            &mut self.storage,
            &mut self.counters,
        );

        for event in events {
            match event {
                RadioEvent::Admitted { node_id, .. } => self.node_admitted(node_id, now_ms, sink),
                RadioEvent::Rejected { addr, reason } => {
                    sink.emit(&AppEvent::PairingRejected { addr, reason });
                    let why = match reason {
                        RegistryError::Full => "registry_full",
                        RegistryError::UnknownNode => "invalid_id",
                        RegistryError::Storage => "storage",
                    };
                    self.publish_pairing_status("node_rejected", now_ms, None, None, Some(why));
                }
                RadioEvent::WindowClosed(reason) => self.window_closed(reason, now_ms, sink),
                RadioEvent::Status { node_id, status } => {
                    if let Some(t) = status.temperature {
                        let _ = samples.push(SensorSample {
                            node_id: node_id.clone(),
                            temperature_c: t,
                            timestamp_ms: now_ms,
                        });
                    }
                    self.publish_tower_status(&node_id, &status, now_ms);
                }
                RadioEvent::Telemetry { node_id, telemetry } => {
                    let body = TowerTelemetryPayload::new(
                        &self.cfg.identity.farm_id,
                        &self.cfg.identity.coord_id,
                        &node_id,
                        &telemetry,
                        now_ms,
                    );
                    let _ = self.uplink.publish(
                        MessageKind::TowerTelemetry,
                        Some(&node_id),
                        &body,
                        &mut self.counters,
                    );
                }
                RadioEvent::Ack { node_id, ack } => {
                    debug!("radio: {} acked {}", node_id, ack.cmd_id);
                    let body = AckPayload {
                        cmd: "node_ack",
                        ok: true,
                        reason: None,
                        node_id: Some(&node_id),
                        cmd_id: Some(&ack.cmd_id),
                    };
                    self.uplink.publish_ack(&body, &mut self.counters);
                }
                RadioEvent::Fault { node_id, fault } => {
                    warn!("node {}: fault {} {}", node_id, fault.code, fault.info);
                }
            }
        }
        samples
    }

    fn node_admitted(&mut self, node_id: NodeId, now_ms: u64, sink: &mut impl EventSink) {
        self.thermal.forget(&node_id);
        let accept = PeerMessage::TowerJoinAccept(JoinAccept {
            tower_id: node_id.clone(),
            coord_id: self.cfg.identity.coord_id.clone(),
            farm_id: self.cfg.identity.farm_id.clone(),
            wifi_channel: self.radio.channel(),
            cfg: JoinAcceptCfg {
                telemetry_interval_ms: self.cfg.telemetry.node_interval_ms,
            },
        });
        if let Err(e) = self.radio.send_message(&self.registry, &node_id, &accept) {
            self.counters.send_failures = self.counters.send_failures.saturating_add(1);
            warn!("radio: join accept to {} failed: {}", node_id, e);
        }
        self.publish_pairing_status("node_admitted", now_ms, None, Some(&node_id), None);
        sink.emit(&AppEvent::NodeAdmitted { node_id });
    }

    fn window_closed(&mut self, reason: CloseReason, now_ms: u64, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::PairingClosed(reason));
        let body = PairingCompletePayload {
            ts: payload::ts(now_ms),
            reason: reason.as_str(),
            nodes: self.registry.len(),
        };
        let _ = self
            .uplink
            .publish(MessageKind::PairingComplete, None, &body, &mut self.counters);
        self.publish_pairing_status("window_closed", now_ms, None, None, Some(reason.as_str()));
    }

    fn pump_radar(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        let Some(event) = self.radar.poll(now_ms, &mut self.counters) else {
            return;
        };
        self.presence = event.presence();
        self.confidence = event.confidence();

        let transitions = self.zones.update(&event);
        for t in &transitions {
            sink.emit(&AppEvent::ZoneChanged {
                zone_id: t.zone_id.clone(),
                occupied: t.occupied,
            });
            self.actuate_zone(&t.zone_id, t.occupied);
        }

        if !transitions.is_empty() || now_ms >= self.next_mmwave_ms {
            self.next_mmwave_ms = now_ms + MMWAVE_PUBLISH_MS;
            self.publish_mmwave(&event);
        }
    }

    fn publish_mmwave(&mut self, event: &RadarEvent) {
        let body = MmwavePayload::from(event);
        let _ = self
            .uplink
            .publish(MessageKind::Mmwave, None, &body, &mut self.counters);
    }

    /// Drive every actuator of a zone to the occupied or vacant duty.
    /// Nodes already at that duty are left alone.
    fn actuate_zone(&mut self, zone_id: &str, occupied: bool) {
        let Some(mapping) = self.zones.mapping(zone_id) else {
            return;
        };
        let actuators = mapping.actuators.clone();
        let duty = if occupied {
            self.cfg.zones.occupied_duty
        } else {
            self.cfg.zones.vacant_duty
        };

        for actuator in &actuators {
            let Some(node) = self.registry.node_for_actuator(actuator) else {
                debug!("zone {}: actuator {} has no paired node", zone_id, actuator);
                continue;
            };
            if node.last_duty == duty {
                continue;
            }
            let node_id = node.node_id.clone();
            let value = duty.min(self.thermal.ceiling(&node_id));
            let msg = PeerMessage::SetLight(SetLight::new(actuator.clone(), value, "zone"));
            match self.radio.send_message(&self.registry, &node_id, &msg) {
                Ok(()) => {
                    if let Err(e) = self.registry.record_duty(&node_id, duty, &mut self.storage) {
                        warn!("registry: duty for {} not persisted: {}", node_id, e);
                    }
                }
                Err(e) => {
                    self.counters.send_failures = self.counters.send_failures.saturating_add(1);
                    warn!("zone {}: set_light to {} failed: {}", zone_id, node_id, e);
                }
            }
        }
    }

    fn pump_thermal(&mut self, sample: &SensorSample, sink: &mut impl EventSink) {
        let event = self.thermal.process(sample);
        if sample.temperature_c.is_finite() {
            let level = self.thermal.level(&sample.node_id);
            self.registry
                .apply_thermal(&sample.node_id, sample.temperature_c, level);
        }
        let Some(event) = event else {
            return;
        };

        let body = ThermalPayload::from(&event);
        let _ = self.uplink.publish(
            MessageKind::TowerThermal,
            Some(&event.node_id),
            &body,
            &mut self.counters,
        );

        // Push the new ceiling so a derated node drops output now, and a
        // recovered one returns to what it was last asked for.
        if let Some(node) = self.registry.lookup(&event.node_id) {
            let value = node.last_duty.min(event.deration_level);
            let msg = PeerMessage::SetLight(SetLight::new(node.actuator_id.clone(), value, "thermal"));
            if let Err(e) = self.radio.send_message(&self.registry, &event.node_id, &msg) {
                self.counters.send_failures = self.counters.send_failures.saturating_add(1);
                warn!("thermal: ceiling to {} failed: {}", event.node_id, e);
            }
        }
        sink.emit(&AppEvent::Thermal(event));
    }

    fn pump_uplink(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.uplink
            .set_link_up(self.link.is_connected(), now_ms, &mut self.counters);
        match self.uplink.poll_session(&mut self.counters) {
            Some(true) => {
                let rssi = self.link.signal_strength();
                self.uplink
                    .publish_connection(true, rssi, now_ms, &mut self.counters);
            }
            // Unclean loss: the broker publishes the will.
            Some(false) => debug!("uplink: waiting for broker session to return"),
            None => {}
        }

        for parsed in self.uplink.poll_commands(&mut self.counters) {
            self.dispatch(parsed, now_ms, sink);
        }

        if now_ms >= self.next_telemetry_ms {
            self.publish_telemetry(now_ms, sink);
        }
    }

    fn link_changed(&mut self, from: LinkState, to: LinkState, sink: &mut impl EventSink) {
        info!("link: {} → {}", from.as_str(), to.as_str());
        sink.emit(&AppEvent::LinkChanged { from, to });
    }

    fn save_config_if_due(&mut self, now_ms: u64) {
        let Some(since) = self.config_dirty_since else {
            return;
        };
        if now_ms.saturating_sub(since) < CONFIG_SAVE_DEBOUNCE_MS {
            return;
        }
        match config::save_config(&mut self.storage, &self.cfg) {
            Ok(()) => {
                self.config_dirty_since = None;
                info!("config: saved");
            }
            Err(e) => {
                warn!("config: save failed: {e}");
                self.config_dirty_since = Some(now_ms);
            }
        }
    }

    // ── Publishing helpers ────────────────────────────────────

    fn publish_pairing_status(
        &mut self,
        event: &str,
        now_ms: u64,
        duration_ms: Option<u32>,
        node_id: Option<&str>,
        reason: Option<&str>,
    ) {
        let body = PairingStatusPayload {
            ts: payload::ts(now_ms),
            event,
            open: self.radio.pairing_window().is_open(),
            duration_ms,
            node_id,
            reason,
            nodes: self.registry.len(),
        };
        let _ = self
            .uplink
            .publish(MessageKind::PairingStatus, None, &body, &mut self.counters);
    }

    fn publish_tower_status(&mut self, node_id: &str, status: &NodeStatus, now_ms: u64) {
        let Some(node) = self.registry.lookup(node_id) else {
            return;
        };
        let stale = now_ms.saturating_sub(node.last_seen_ms)
            > u64::from(self.cfg.telemetry.stale_node_ms);
        let body = TowerStatusPayload::new(node, status, stale, now_ms);
        let _ = self.uplink.publish(
            MessageKind::TowerStatus,
            Some(node_id),
            &body,
            &mut self.counters,
        );
    }

    fn publish_telemetry(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.next_telemetry_ms = now_ms + u64::from(self.cfg.telemetry.coordinator_interval_ms);
        let snap = self.snapshot(now_ms);
        let stale = self
            .registry
            .stale_nodes(now_ms, self.cfg.telemetry.stale_node_ms)
            .count();
        let body = CoordinatorTelemetryPayload::new(
            &self.cfg.identity.farm_id,
            &self.cfg.identity.coord_id,
            &snap,
            self.registry.len(),
            stale,
            self.counters,
        );
        let _ = self.uplink.publish(
            MessageKind::CoordinatorTelemetry,
            None,
            &body,
            &mut self.counters,
        );
        sink.emit(&AppEvent::Telemetry(snap));
    }

    // ── Queries ───────────────────────────────────────────────

    /// Assemble the coordinator's own telemetry.  Reads the ambient sensors.
    pub fn snapshot(&mut self, now_ms: u64) -> CoordinatorSnapshot {
        let radar_online = self.radar.is_online();
        CoordinatorSnapshot {
            light_lux: self.ambient.read_lux(),
            temperature_c: self.ambient.read_temperature_c(),
            radar_presence: radar_online && self.presence,
            radar_confidence: if radar_online { self.confidence } else { 0.0 },
            radar_online,
            wifi_rssi: self.link.signal_strength(),
            wifi_connected: self.link.is_connected(),
            timestamp_ms: now_ms,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn radio(&self) -> &PeerRadio<P::Radio> {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut PeerRadio<P::Radio> {
        &mut self.radio
    }

    pub fn link(&self) -> &LinkManager<P::Wifi> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut LinkManager<P::Wifi> {
        &mut self.link
    }

    pub fn uplink(&self) -> &UplinkBridge<P::Broker> {
        &self.uplink
    }

    pub fn uplink_mut(&mut self) -> &mut UplinkBridge<P::Broker> {
        &mut self.uplink
    }

    pub fn radar_mut(&mut self) -> &mut RadarDriver<P::Radar> {
        &mut self.radar
    }

    pub fn zones(&self) -> &ZoneControl {
        &self.zones
    }

    pub fn thermal(&self) -> &ThermalControl {
        &self.thermal
    }

    pub fn storage(&self) -> &P::Storage {
        &self.storage
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty_since.is_some()
    }
}

fn short_name(name: &str) -> heapless::String<24> {
    let mut out = heapless::String::new();
    let _ = out.write_str(name);
    out
}
