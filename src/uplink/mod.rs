//! Uplink bridge: typed publishes out, parsed commands in.
//!
//! Publishing is best effort.  While the broker session is down every
//! outbound message is dropped and counted, except command acks, which are
//! parked in a small queue and published once when the session returns.

pub mod payload;
pub mod topics;

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::{BrokerPort, LastWill};
use crate::config::{BrokerConfig, IdentityConfig};
use crate::diagnostics::Counters;
use crate::error::UplinkError;

use payload::{AckPayload, ConnectionPayload, ParsedCommand};
use topics::{MessageKind, TopicMap};

/// Acks parked while the session is down.
pub const PENDING_ACKS: usize = 8;
/// Inbound messages handled per tick.
pub const INBOUND_BUDGET: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Session {
    Down,
    Connecting,
    Up,
}

pub struct UplinkBridge<B: BrokerPort> {
    broker: B,
    topics: TopicMap,
    identity: IdentityConfig,
    broker_cfg: BrokerConfig,
    session: Session,
    pending_acks: heapless::Deque<Vec<u8>, PENDING_ACKS>,
}

impl<B: BrokerPort> UplinkBridge<B> {
    pub fn new(broker: B, identity: &IdentityConfig, broker_cfg: &BrokerConfig) -> Self {
        Self {
            broker,
            topics: TopicMap::new(&identity.farm_id, &identity.coord_id),
            identity: identity.clone(),
            broker_cfg: broker_cfg.clone(),
            session: Session::Down,
            pending_acks: heapless::Deque::new(),
        }
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    pub fn is_up(&self) -> bool {
        self.session == Session::Up
    }

    pub fn pending_acks(&self) -> usize {
        self.pending_acks.len()
    }

    fn will(&self) -> LastWill {
        let body = ConnectionPayload {
            ts: 0,
            farm_id: &self.identity.farm_id,
            coord_id: &self.identity.coord_id,
            status: "offline",
            event: "mqtt_disconnected",
            wifi_connected: false,
            wifi_rssi: -127,
            mqtt_connected: false,
            uptime_ms: 0,
            reason: Some("unclean_disconnect"),
        };
        LastWill {
            topic: self
                .topics
                .topic(MessageKind::ConnectionStatus, None)
                .unwrap_or_default(),
            payload: serde_json::to_vec(&body).unwrap_or_default(),
        }
    }

    // ── Session ───────────────────────────────────────────────

    /// Follow the link state.  Starts a broker session when the link comes
    /// up and tears it down when the link goes away.
    ///
    /// A clean disconnect suppresses the broker-side will, so an open
    /// session publishes its own retained offline status first.
    pub fn set_link_up(&mut self, link_up: bool, now_ms: u64, counters: &mut Counters) {
        match (link_up, self.session) {
            (true, Session::Down) => {
                if self.broker_cfg.host.is_empty() {
                    debug!("uplink: no broker configured");
                    return;
                }
                let will = self.will();
                match self.broker.connect(&self.broker_cfg, &self.identity.coord_id, &will) {
                    Ok(()) => {
                        info!(
                            "uplink: connecting to {}:{}",
                            self.broker_cfg.host, self.broker_cfg.port
                        );
                        self.session = Session::Connecting;
                    }
                    Err(e) => warn!("uplink: broker connect failed: {e}"),
                }
            }
            (false, Session::Connecting | Session::Up) => {
                if self.session == Session::Up {
                    self.publish_connection(false, None, now_ms, counters);
                }
                self.broker.disconnect();
                self.session = Session::Down;
                info!("uplink: session closed, link down");
            }
            _ => {}
        }
    }

    /// Track the broker session.  Returns `Some(true)` when it came up and
    /// `Some(false)` when it dropped.
    pub fn poll_session(&mut self, counters: &mut Counters) -> Option<bool> {
        match self.session {
            Session::Connecting if self.broker.is_connected() => {
                self.session = Session::Up;
                for filter in self.topics.subscriptions() {
                    if let Err(e) = self.broker.subscribe(&filter) {
                        warn!("uplink: subscribe {filter} failed: {e}");
                    }
                }
                info!("uplink: session up");
                self.flush_acks(counters);
                Some(true)
            }
            Session::Up if !self.broker.is_connected() => {
                // The client reconnects on its own; wait for it.
                self.session = Session::Connecting;
                warn!("uplink: session lost");
                Some(false)
            }
            _ => None,
        }
    }

    /// Publish each parked ack once.  Failures are counted, not re-queued.
    fn flush_acks(&mut self, counters: &mut Counters) {
        let Some(topic) = self.topics.topic(MessageKind::CommandAck, None) else {
            return;
        };
        while let Some(body) = self.pending_acks.pop_front() {
            if let Err(e) = self.broker.publish(&topic, &body, false) {
                counters.acks_dropped = counters.acks_dropped.saturating_add(1);
                warn!("uplink: ack retry failed: {e}");
            }
        }
    }

    // ── Outbound ──────────────────────────────────────────────

    /// Serialize and publish.  Dropped (and counted) while the session is
    /// down.
    pub fn publish<T: Serialize>(
        &mut self,
        kind: MessageKind,
        node_id: Option<&str>,
        body: &T,
        counters: &mut Counters,
    ) -> Result<(), UplinkError> {
        if !self.is_up() {
            counters.publish_dropped = counters.publish_dropped.saturating_add(1);
            return Err(UplinkError::Disconnected);
        }
        let Some(topic) = self.topics.topic(kind, node_id) else {
            warn!("uplink: no topic for {:?} / {:?}", kind, node_id);
            return Err(UplinkError::PublishFailed);
        };
        let bytes = serde_json::to_vec(body).map_err(|_| UplinkError::PublishFailed)?;
        self.broker
            .publish(&topic, &bytes, kind.retained())
            .inspect_err(|e| {
                counters.publish_dropped = counters.publish_dropped.saturating_add(1);
                warn!("uplink: publish {topic} failed: {e}");
            })
    }

    /// Publish an ack, parking it if the session is down.  When the queue
    /// is full the oldest parked ack is dropped.
    pub fn publish_ack(&mut self, ack: &AckPayload<'_>, counters: &mut Counters) {
        let Ok(body) = serde_json::to_vec(ack) else {
            return;
        };
        if self.is_up() {
            if let Some(topic) = self.topics.topic(MessageKind::CommandAck, None) {
                if self.broker.publish(&topic, &body, false).is_ok() {
                    return;
                }
            }
        }
        if self.pending_acks.is_full() {
            self.pending_acks.pop_front();
            counters.acks_dropped = counters.acks_dropped.saturating_add(1);
        }
        let _ = self.pending_acks.push_back(body);
        debug!("uplink: ack for '{}' parked", ack.cmd);
    }

    pub fn publish_connection(
        &mut self,
        online: bool,
        rssi: Option<i8>,
        now_ms: u64,
        counters: &mut Counters,
    ) {
        let body = ConnectionPayload {
            ts: payload::ts(now_ms),
            farm_id: &self.identity.farm_id,
            coord_id: &self.identity.coord_id,
            status: if online { "online" } else { "offline" },
            event: if online { "mqtt_connected" } else { "mqtt_disconnected" },
            wifi_connected: rssi.is_some(),
            wifi_rssi: rssi.map_or(-127, i16::from),
            mqtt_connected: online,
            uptime_ms: now_ms,
            reason: None,
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        if !self.is_up() {
            counters.publish_dropped = counters.publish_dropped.saturating_add(1);
            return;
        }
        if let Some(topic) = self.topics.topic(MessageKind::ConnectionStatus, None) {
            if let Err(e) = self.broker.publish(&topic, &bytes, true) {
                warn!("uplink: connection status publish failed: {e}");
            }
        }
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Pull up to [`INBOUND_BUDGET`] messages and parse the ones addressed
    /// to this coordinator.
    pub fn poll_commands(
        &mut self,
        counters: &mut Counters,
    ) -> heapless::Vec<ParsedCommand, INBOUND_BUDGET> {
        let mut out = heapless::Vec::new();
        for _ in 0..INBOUND_BUDGET {
            let Some(msg) = self.broker.poll_inbound() else {
                break;
            };
            let Some(route) = self.topics.route(&msg.topic) else {
                debug!("uplink: ignoring {}", msg.topic);
                continue;
            };
            match payload::parse_command(route, &msg.payload) {
                Ok(cmd) => {
                    let _ = out.push(cmd);
                }
                Err(e) => {
                    counters.malformed(e);
                    warn!("uplink: dropped {} on {}", e, msg.topic);
                }
            }
        }
        out
    }
}
