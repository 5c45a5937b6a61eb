//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`].  The ESP-IDF client runs its own task; its
//! event callback only flips the session flag and forwards received
//! messages into a bounded `embassy-sync` channel that the tick drains
//! through [`BrokerPort::poll_inbound`].
//!
//! ```text
//! ┌──────────────┐  InboundMessage  ┌──────────────┐
//! │ mqtt task cb │────────────────▶│  tick loop    │
//! └──────────────┘                  └──────────────┘
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::{BrokerPort, InboundMessage, LastWill};
use crate::config::BrokerConfig;
use crate::error::UplinkError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};

/// Inbound messages buffered between the client task and the tick.
pub const INBOUND_DEPTH: usize = 8;
/// Larger command payloads are dropped in the callback.
pub const MAX_INBOUND_PAYLOAD: usize = 2048;

type InboundChannel = Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_DEPTH>;

fn inbound_channel() -> &'static InboundChannel {
    Box::leak(Box::new(Channel::new()))
}

/// Hand a message to the tick.  Oversized or overflow messages are dropped.
fn forward(inbound: &InboundChannel, topic: &str, data: &[u8]) {
    if data.len() > MAX_INBOUND_PAYLOAD {
        warn!("mqtt: dropping {} byte payload on {topic}", data.len());
        return;
    }
    let msg = InboundMessage {
        topic: topic.into(),
        payload: data.to_vec(),
    };
    if inbound.try_send(msg).is_err() {
        warn!("mqtt: inbound queue full, dropped message on {topic}");
    }
}

pub struct MqttAdapter {
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
    connected: Arc<AtomicBool>,
    inbound: &'static InboundChannel,
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
            connected: Arc::new(AtomicBool::new(false)),
            inbound: inbound_channel(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl BrokerPort for MqttAdapter {
    fn connect(
        &mut self,
        broker: &BrokerConfig,
        client_id: &str,
        will: &LastWill,
    ) -> Result<(), UplinkError> {
        let url = broker.url().ok_or(UplinkError::Disconnected)?;
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: (!broker.username.is_empty()).then_some(broker.username.as_str()),
            password: (!broker.password.is_empty()).then_some(broker.password.as_str()),
            keep_alive_interval: Some(core::time::Duration::from_secs(30)),
            lwt: Some(LwtConfiguration {
                topic: &will.topic,
                payload: &will.payload,
                qos: QoS::AtLeastOnce,
                retain: true,
            }),
            ..Default::default()
        };

        let connected = Arc::clone(&self.connected);
        let inbound = self.inbound;
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => connected.store(true, Ordering::Release),
            EventPayload::Disconnected => connected.store(false, Ordering::Release),
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => forward(inbound, topic, data),
            EventPayload::Error(e) => warn!("mqtt: client error: {e:?}"),
            _ => {}
        })
        .map_err(|e| {
            warn!("mqtt: client init failed: {e}");
            UplinkError::Disconnected
        })?;

        self.connected.store(false, Ordering::Release);
        self.client = Some(client);
        info!("mqtt: client started for {url}");
        Ok(())
    }

    fn disconnect(&mut self) {
        // Dropping the client stops its task and closes the socket.
        self.client = None;
        self.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Acquire)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), UplinkError> {
        let client = self.client.as_mut().ok_or(UplinkError::Disconnected)?;
        client
            .enqueue(topic, QoS::AtMostOnce, retain, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("mqtt: enqueue on {topic} failed: {e}");
                UplinkError::PublishFailed
            })
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), UplinkError> {
        let client = self.client.as_mut().ok_or(UplinkError::Disconnected)?;
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|_| UplinkError::SubscribeFailed)
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimBroker {
    session: bool,
    will: Option<LastWill>,
    published: Vec<(String, Vec<u8>, bool)>,
    subscriptions: Vec<String>,
}

/// Host-side broker: sessions come up immediately, publishes are recorded
/// and inbound traffic is injected with [`MqttAdapter::deliver`].
#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        forward(self.inbound, topic, payload);
    }

    pub fn take_published(&mut self) -> Vec<(String, Vec<u8>, bool)> {
        core::mem::take(&mut self.sim.published)
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.sim.subscriptions
    }

    pub fn will(&self) -> Option<&LastWill> {
        self.sim.will.as_ref()
    }

    /// Simulate the broker dropping the session.
    pub fn drop_session(&mut self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(not(target_os = "espidf"))]
impl BrokerPort for MqttAdapter {
    fn connect(
        &mut self,
        broker: &BrokerConfig,
        client_id: &str,
        will: &LastWill,
    ) -> Result<(), UplinkError> {
        info!(
            "mqtt(sim): {client_id} connected to {}:{}",
            broker.host, broker.port
        );
        self.sim.session = true;
        self.sim.will = Some(will.clone());
        self.sim.subscriptions.clear();
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.sim.session = false;
        self.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.sim.session && self.connected.load(Ordering::Acquire)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), UplinkError> {
        if !self.is_connected() {
            return Err(UplinkError::Disconnected);
        }
        self.sim
            .published
            .push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), UplinkError> {
        if !self.sim.session {
            return Err(UplinkError::SubscribeFailed);
        }
        self.sim.subscriptions.push(topic.into());
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.try_receive().ok()
    }
}
