//! Peer radio layer.
//!
//! Owns the low-level radio driver, the receive ring consumer and the
//! pairing window.  Three pumps run from the tick:
//!
//! - [`PeerRadio::drain`]: decode queued frames, admit new nodes while the
//!   window is open, and hand everything else up as [`RadioEvent`]s.
//! - [`PeerRadio::reconcile`]: make the driver's peer table mirror the
//!   registry exactly.
//! - [`PeerRadio::send`]: the only way a frame reaches a node; refuses any
//!   target the registry does not know.

pub mod frame;
pub mod pairing;

use log::{debug, info, warn};

use crate::app::ports::{RadioPort, StoragePort};
use crate::config::{PairingConfig, RadioConfig};
use crate::diagnostics::Counters;
use crate::error::{LinkError, RadioConfigError, RegistryError};
use crate::events::{self, RxConsumer};
use crate::registry::{self, MacAddress, NodeId, NodeRegistry};

use frame::{NodeAck, NodeFault, NodeStatus, PeerMessage, TowerTelemetry};
use pairing::{CloseReason, PairingWindow};

/// Frames handled per tick; the rest wait for the next tick.
pub const DRAIN_BUDGET: usize = 8;

/// Everything the tick needs to know about after a drain.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    Admitted { node_id: NodeId, addr: MacAddress },
    Rejected { addr: MacAddress, reason: RegistryError },
    WindowClosed(CloseReason),
    Status { node_id: NodeId, status: NodeStatus },
    Telemetry { node_id: NodeId, telemetry: TowerTelemetry },
    Ack { node_id: NodeId, ack: NodeAck },
    Fault { node_id: NodeId, fault: NodeFault },
}

/// Peer table changes made by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: u8,
    pub removed: u8,
}

pub struct PeerRadio<R: RadioPort> {
    driver: R,
    rx: Option<RxConsumer>,
    window: PairingWindow,
    channel: u8,
}

impl<R: RadioPort> PeerRadio<R> {
    pub fn new(driver: R, pairing: &PairingConfig) -> Self {
        Self {
            driver,
            rx: None,
            window: PairingWindow::new(pairing),
            channel: 0,
        }
    }

    pub fn driver(&self) -> &R {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut R {
        &mut self.driver
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    // ── Configuration ─────────────────────────────────────────

    /// Validate and apply channel / power, and install the receive ring on
    /// first call.  Any error here is fatal at boot.
    pub fn configure(&mut self, cfg: &RadioConfig) -> Result<(), RadioConfigError> {
        if !(1..=13).contains(&cfg.channel) {
            return Err(RadioConfigError::InvalidChannel);
        }
        if !(2..=20).contains(&cfg.tx_power_dbm) {
            return Err(RadioConfigError::InvalidPower);
        }
        self.driver.configure(cfg.channel, cfg.tx_power_dbm)?;
        if self.rx.is_none() {
            let (producer, consumer) = events::rx_channel();
            self.driver.start_receive(producer)?;
            self.rx = Some(consumer);
        }
        self.channel = cfg.channel;
        info!("radio: channel {} @ {} dBm", cfg.channel, cfg.tx_power_dbm);
        Ok(())
    }

    // ── Pairing window ────────────────────────────────────────

    pub fn open_pairing_window(&mut self, now_ms: u64, duration_ms: Option<u32>) -> u32 {
        self.window.open(now_ms, duration_ms)
    }

    /// Idempotent.  Returns `true` if the window was open.
    pub fn close_pairing_window(&mut self) -> bool {
        let was_open = self.window.close();
        if was_open {
            info!("pairing: window closed manually");
        }
        was_open
    }

    pub fn pairing_window(&self) -> &PairingWindow {
        &self.window
    }

    // ── Send ──────────────────────────────────────────────────

    /// Send raw bytes to a registered node.
    pub fn send(
        &mut self,
        registry: &NodeRegistry,
        node_id: &str,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        let node = registry.lookup(node_id).ok_or(LinkError::UnknownPeer)?;
        if !self.driver.has_peer(&node.addr) {
            return Err(LinkError::UnknownPeer);
        }
        if payload.len() > events::MAX_FRAME_LEN {
            return Err(LinkError::PayloadTooLarge);
        }
        self.driver.send(&node.addr, payload)
    }

    pub fn send_message(
        &mut self,
        registry: &NodeRegistry,
        node_id: &str,
        msg: &PeerMessage,
    ) -> Result<(), LinkError> {
        let bytes = msg.encode()?;
        self.send(registry, node_id, &bytes)
    }

    // ── Receive ───────────────────────────────────────────────

    /// Run the window deadline, then drain up to [`DRAIN_BUDGET`] frames.
    pub fn drain(
        &mut self,
        now_ms: u64,
        registry: &mut NodeRegistry,
        storage: &mut impl StoragePort,
        counters: &mut Counters,
    ) -> heapless::Vec<RadioEvent, { DRAIN_BUDGET + 1 }> {
        let mut out = heapless::Vec::new();
        let dropped = self.rx.as_ref().map_or(0, RxConsumer::take_dropped);
        counters.rx_dropped = counters.rx_dropped.saturating_add(dropped);

        // Frames queued before the deadline but drained after it are not
        // admitted.
        if let Some(reason) = self.window.poll(now_ms) {
            let _ = out.push(RadioEvent::WindowClosed(reason));
        }

        for _ in 0..DRAIN_BUDGET {
            let Some(frame) = self.rx.as_mut().and_then(RxConsumer::dequeue) else {
                break;
            };
            let msg = match PeerMessage::decode(&frame.data) {
                Ok(m) => m,
                Err(e) => {
                    counters.malformed(e);
                    warn!("radio: dropped {} from {:02X?}", e, frame.src);
                    continue;
                }
            };

            let event = match registry.lookup_by_addr(&frame.src) {
                Some(node) => {
                    let node_id = node.node_id.clone();
                    registry.touch(&node_id, now_ms);
                    Self::dispatch_known(node_id, msg)
                }
                None if self.window.is_open() => {
                    self.admit(now_ms, frame.src, &msg, registry, storage, counters)
                }
                None => {
                    counters.unknown_sender = counters.unknown_sender.saturating_add(1);
                    debug!("radio: {} from unknown {:02X?} ignored", msg.kind(), frame.src);
                    None
                }
            };
            if let Some(ev) = event {
                let admitted = matches!(ev, RadioEvent::Admitted { .. });
                let _ = out.push(ev);
                if admitted {
                    if let Some(reason) = self.window.record_admission() {
                        let _ = out.push(RadioEvent::WindowClosed(reason));
                    }
                }
            }
        }
        out
    }

    fn dispatch_known(node_id: NodeId, msg: PeerMessage) -> Option<RadioEvent> {
        match msg {
            PeerMessage::NodeStatus(status) => Some(RadioEvent::Status { node_id, status }),
            PeerMessage::TowerTelemetry(telemetry) => {
                Some(RadioEvent::Telemetry { node_id, telemetry })
            }
            PeerMessage::Ack(ack) => Some(RadioEvent::Ack { node_id, ack }),
            PeerMessage::Error(fault) => Some(RadioEvent::Fault { node_id, fault }),
            // Re-join from a paired node only refreshes last-seen.
            PeerMessage::JoinRequest(_) => None,
            other => {
                debug!("radio: {} from node {} ignored", other.kind(), node_id);
                None
            }
        }
    }

    /// Any frame from an unknown sender while the window is open is a
    /// pairing request.
    fn admit(
        &mut self,
        now_ms: u64,
        addr: MacAddress,
        msg: &PeerMessage,
        registry: &mut NodeRegistry,
        storage: &mut impl StoragePort,
        counters: &mut Counters,
    ) -> Option<RadioEvent> {
        let node_id = match msg.claimed_node_id() {
            Some(id) if !id.is_empty() && registry.lookup(id).is_none_or(|n| n.addr == addr) => {
                let mut out = NodeId::new();
                if out.push_str(id).is_err() {
                    registry::node_id_for(&addr)
                } else {
                    out
                }
            }
            _ => registry::node_id_for(&addr),
        };

        if registry.is_full() {
            counters.registry_full = counters.registry_full.saturating_add(1);
            warn!("pairing: registry full, rejecting {:02X?}", addr);
            return Some(RadioEvent::Rejected {
                addr,
                reason: RegistryError::Full,
            });
        }

        if let Err(e) = self.driver.add_peer(&addr) {
            counters.send_failures = counters.send_failures.saturating_add(1);
            warn!("pairing: add peer {:02X?} failed: {}", addr, e);
            return None;
        }

        match registry.upsert_on_pairing(&node_id, addr, now_ms, storage) {
            Ok(_) => {
                info!("pairing: admitted {} ({:02X?})", node_id, addr);
                Some(RadioEvent::Admitted { node_id, addr })
            }
            Err(reason) => {
                let _ = self.driver.remove_peer(&addr);
                if reason == RegistryError::Full {
                    counters.registry_full = counters.registry_full.saturating_add(1);
                }
                warn!("pairing: {} rejected: {}", node_id, reason);
                Some(RadioEvent::Rejected { addr, reason })
            }
        }
    }

    // ── Reconciliation ────────────────────────────────────────

    /// Remove driver peers the registry does not know; add registry nodes
    /// the driver lacks.  Run once per tick.
    pub fn reconcile(&mut self, registry: &NodeRegistry) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for addr in self.driver.peers() {
            if registry.lookup_by_addr(&addr).is_none() {
                match self.driver.remove_peer(&addr) {
                    Ok(()) => {
                        report.removed += 1;
                        info!("radio: removed stale peer {:02X?}", addr);
                    }
                    Err(e) => warn!("radio: remove stale peer {:02X?} failed: {}", addr, e),
                }
            }
        }

        for node in registry.all() {
            if !self.driver.has_peer(&node.addr) {
                match self.driver.add_peer(&node.addr) {
                    Ok(()) => report.added += 1,
                    Err(e) => warn!("radio: re-add {} failed: {}", node.node_id, e),
                }
            }
        }
        report
    }
}
