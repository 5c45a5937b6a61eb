//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Coordinator (domain)
//! ```
//!
//! Driven adapters (radio, Wi-Fi, broker, radar UART, ambient sensors,
//! storage, event sinks) implement these traits.  The
//! [`Coordinator`](super::coordinator::Coordinator) consumes them through a
//! [`Platform`] bundle, so the domain core never touches hardware directly.
//!
//! Every port call is non-blocking or bounded by a short timeout: the tick
//! loop must return promptly.

use core::fmt;

use crate::config::{self, BrokerConfig, CoordinatorConfig, WifiCredentials};
use crate::error::{LinkError, RadioConfigError, UplinkError};
use crate::events::RxProducer;
use crate::registry::MacAddress;

// ───────────────────────────────────────────────────────────────
// Peer radio port (ESP-NOW class)
// ───────────────────────────────────────────────────────────────

/// Low-level peer-to-peer radio.  Reception is callback-driven: the driver
/// pushes raw frames into the [`RxProducer`] handed over by `start_receive`.
pub trait RadioPort {
    fn configure(&mut self, channel: u8, tx_power_dbm: i8) -> Result<(), RadioConfigError>;

    /// Install the receive callback.  Called once at boot.
    fn start_receive(&mut self, producer: RxProducer) -> Result<(), RadioConfigError>;

    fn add_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError>;
    fn remove_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError>;
    fn has_peer(&self, addr: &MacAddress) -> bool;
    /// Snapshot of the driver's peer table.
    fn peers(&self) -> heapless::Vec<MacAddress, { config::MAX_PEERS }>;

    /// Queue one frame for transmission.  Must not wait for the air ack.
    fn send(&mut self, addr: &MacAddress, payload: &[u8]) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi port
// ───────────────────────────────────────────────────────────────

/// Outcome of polling an in-flight connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPoll {
    Pending,
    Connected,
    Failed,
}

/// Station-mode Wi-Fi, driven in non-blocking steps.
pub trait WifiPort {
    /// Kick off association with `creds`; returns immediately.
    fn begin_connect(&mut self, creds: &WifiCredentials) -> Result<(), UplinkError>;
    fn poll_connect(&mut self) -> ConnectPoll;
    fn is_connected(&self) -> bool;
    fn disconnect(&mut self);
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Broker port (MQTT)
// ───────────────────────────────────────────────────────────────

/// One message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Retained message the broker publishes if the session drops uncleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub trait BrokerPort {
    /// Start a broker session.  The session comes up asynchronously.
    fn connect(
        &mut self,
        broker: &BrokerConfig,
        client_id: &str,
        will: &LastWill,
    ) -> Result<(), UplinkError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Enqueue a publish.  Never waits for the broker.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), UplinkError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), UplinkError>;
    fn poll_inbound(&mut self) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// Sensor ports
// ───────────────────────────────────────────────────────────────

/// Byte stream from the radar UART.
pub trait RadarPort {
    /// Copy whatever is buffered into `buf`, returning the count.  Never blocks.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// Coordinator-local ambient sensors.  `None` when a sensor is absent or failed.
pub trait AmbientPort {
    fn read_lux(&mut self) -> Option<f32>;
    fn read_temperature_c(&mut self) -> Option<f32>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage, namespaced per subsystem.
///
/// Write operations MUST be atomic: no partial writes on power loss.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Typed configuration persistence on top of any [`StoragePort`].
///
/// Implementations MUST validate before persisting; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Returns [`CoordinatorConfig::default()`] if nothing is stored.
    fn load_config(&self) -> Result<CoordinatorConfig, ConfigError>;
    fn save_config(&mut self, config: &CoordinatorConfig) -> Result<(), ConfigError>;
}

impl<S: StoragePort> ConfigPort for S {
    fn load_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        config::load_config(self)
    }

    fn save_config(&mut self, config: &CoordinatorConfig) -> Result<(), ConfigError> {
        config::save_config(self, config)
    }
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Ties one concrete adapter to every port the coordinator needs.
pub trait Platform {
    type Radio: RadioPort;
    type Wifi: WifiPort;
    type Broker: BrokerPort;
    type Radar: RadarPort;
    type Ambient: AmbientPort;
    type Storage: StoragePort;
}

// ───────────────────────────────────────────────────────────────
// Port error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NotFound,
    Corrupted,
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::StorageFull => Self::Config("storage full"),
            ConfigError::IoError => Self::Config("I/O error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
