//! Mock adapters for integration tests.
//!
//! Each mock records what the coordinator did to it so tests can assert on
//! the full history without a radio, an AP or a broker.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use farmcoord::app::coordinator::{Coordinator, Peripherals};
use farmcoord::app::events::AppEvent;
use farmcoord::app::ports::{
    AmbientPort, BrokerPort, ConnectPoll, EventSink, InboundMessage, LastWill, Platform,
    RadarPort, RadioPort, StorageError, StoragePort, WifiPort,
};
use farmcoord::config::{self, BrokerConfig, CoordinatorConfig, WifiCredentials};
use farmcoord::error::{LinkError, RadioConfigError, UplinkError};
use farmcoord::events::{self, RxProducer};
use farmcoord::registry::MacAddress;

pub const FARM: &str = "farm001";
pub const COORD: &str = "coord-A1B2C3";
pub const PREFIX: &str = "farm/farm001/coord/coord-A1B2C3";

// ── Storage ───────────────────────────────────────────────────

/// Clones share one backing map, so a second coordinator can "reboot"
/// onto what the first one persisted.
#[derive(Default, Clone)]
pub struct MockStorage {
    map: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    pub fail_writes: bool,
}

impl StoragePort for MockStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let map = self.map.borrow();
        let data = map
            .get(&format!("{namespace}::{key}"))
            .ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.map
            .borrow_mut()
            .insert(format!("{namespace}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.map.borrow_mut().remove(&format!("{namespace}::{key}"));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.map.borrow().contains_key(&format!("{namespace}::{key}"))
    }
}

// ── Peer radio ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRadio {
    producer: Option<RxProducer>,
    pub peers: Vec<MacAddress>,
    pub sent: Vec<(MacAddress, Vec<u8>)>,
    pub configured: Option<(u8, i8)>,
    pub fail_configure: bool,
    pub fail_send: bool,
}

#[allow(dead_code)]
impl MockRadio {
    /// Deliver a frame as if it arrived over the air.
    pub fn inject(&mut self, src: MacAddress, json: &str) {
        let producer = self.producer.as_mut().expect("radio not started");
        assert!(events::enqueue_frame(producer, src, json.as_bytes()));
    }

    pub fn inject_raw(&mut self, src: MacAddress, bytes: &[u8]) {
        let producer = self.producer.as_mut().expect("radio not started");
        events::enqueue_frame(producer, src, bytes);
    }

    /// Decoded frames sent to `addr`, oldest first.
    pub fn sent_to(&self, addr: &MacAddress) -> Vec<serde_json::Value> {
        self.sent
            .iter()
            .filter(|(a, _)| a == addr)
            .map(|(_, b)| serde_json::from_slice(b).expect("sent frame is JSON"))
            .collect()
    }

    pub fn sent_of_kind(&self, addr: &MacAddress, msg: &str) -> Vec<serde_json::Value> {
        self.sent_to(addr)
            .into_iter()
            .filter(|v| v["msg"] == msg)
            .collect()
    }
}

impl RadioPort for MockRadio {
    fn configure(&mut self, channel: u8, tx_power_dbm: i8) -> Result<(), RadioConfigError> {
        if self.fail_configure {
            return Err(RadioConfigError::DriverInit);
        }
        self.configured = Some((channel, tx_power_dbm));
        Ok(())
    }

    fn start_receive(&mut self, producer: RxProducer) -> Result<(), RadioConfigError> {
        self.producer = Some(producer);
        Ok(())
    }

    fn add_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError> {
        if !self.peers.contains(addr) {
            self.peers.push(*addr);
        }
        Ok(())
    }

    fn remove_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError> {
        self.peers.retain(|a| a != addr);
        Ok(())
    }

    fn has_peer(&self, addr: &MacAddress) -> bool {
        self.peers.contains(addr)
    }

    fn peers(&self) -> heapless::Vec<MacAddress, { config::MAX_PEERS }> {
        self.peers.iter().copied().collect()
    }

    fn send(&mut self, addr: &MacAddress, payload: &[u8]) -> Result<(), LinkError> {
        if self.fail_send {
            return Err(LinkError::RadioFailure);
        }
        self.sent.push((*addr, payload.to_vec()));
        Ok(())
    }
}

// ── Wi-Fi ─────────────────────────────────────────────────────

/// Every connect attempt resolves to `outcome` on the next poll.
pub struct MockWifi {
    pub outcome: ConnectPoll,
    pub connected: bool,
    pub attempts: u32,
    pub last_ssid: Option<String>,
}

impl Default for MockWifi {
    fn default() -> Self {
        Self {
            outcome: ConnectPoll::Connected,
            connected: false,
            attempts: 0,
            last_ssid: None,
        }
    }
}

impl WifiPort for MockWifi {
    fn begin_connect(&mut self, creds: &WifiCredentials) -> Result<(), UplinkError> {
        self.attempts += 1;
        self.last_ssid = Some(creds.ssid.as_str().to_owned());
        self.connected = false;
        Ok(())
    }

    fn poll_connect(&mut self) -> ConnectPoll {
        if self.outcome == ConnectPoll::Connected {
            self.connected = true;
        }
        self.outcome
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn rssi(&self) -> Option<i8> {
        self.connected.then_some(-55)
    }
}

// ── Broker ────────────────────────────────────────────────────

pub struct MockBroker {
    /// Whether a started session comes up.
    pub accept_session: bool,
    pub connected: bool,
    pub connects: u32,
    pub will: Option<LastWill>,
    pub published: Vec<(String, Vec<u8>, bool)>,
    pub subscriptions: Vec<String>,
    pub inbound: VecDeque<InboundMessage>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self {
            accept_session: true,
            connected: false,
            connects: 0,
            will: None,
            published: Vec::new(),
            subscriptions: Vec::new(),
            inbound: VecDeque::new(),
        }
    }
}

#[allow(dead_code)]
impl MockBroker {
    /// Queue an inbound message on `{prefix}/{suffix}`.
    pub fn deliver(&mut self, suffix: &str, json: &str) {
        self.inbound.push_back(InboundMessage {
            topic: format!("{PREFIX}/{suffix}"),
            payload: json.as_bytes().to_vec(),
        });
    }

    /// Decoded payloads published on `{prefix}/{suffix}`, oldest first.
    pub fn published_on(&self, suffix: &str) -> Vec<serde_json::Value> {
        let topic = format!("{PREFIX}/{suffix}");
        self.published
            .iter()
            .filter(|(t, _, _)| *t == topic)
            .map(|(_, b, _)| serde_json::from_slice(b).expect("payload is JSON"))
            .collect()
    }

    pub fn acks(&self) -> Vec<serde_json::Value> {
        self.published_on("cmd/ack")
    }
}

impl BrokerPort for MockBroker {
    fn connect(
        &mut self,
        _broker: &BrokerConfig,
        _client_id: &str,
        will: &LastWill,
    ) -> Result<(), UplinkError> {
        self.connects += 1;
        self.will = Some(will.clone());
        self.connected = self.accept_session;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), UplinkError> {
        if !self.connected {
            return Err(UplinkError::Disconnected);
        }
        self.published
            .push((topic.to_owned(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), UplinkError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }
}

// ── Sensors ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRadar {
    pub rx: VecDeque<u8>,
}

impl RadarPort for MockRadar {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *dst = src;
        }
        n
    }
}

pub struct MockAmbient {
    pub lux: Option<f32>,
    pub temperature_c: Option<f32>,
}

impl Default for MockAmbient {
    fn default() -> Self {
        Self {
            lux: Some(320.0),
            temperature_c: Some(22.5),
        }
    }
}

impl AmbientPort for MockAmbient {
    fn read_lux(&mut self) -> Option<f32> {
        self.lux
    }

    fn read_temperature_c(&mut self) -> Option<f32> {
        self.temperature_c
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Platform bundle ───────────────────────────────────────────

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Radio = MockRadio;
    type Wifi = MockWifi;
    type Broker = MockBroker;
    type Radar = MockRadar;
    type Ambient = MockAmbient;
    type Storage = MockStorage;
}

pub type TestCoordinator = Coordinator<MockPlatform>;

/// Defaults with a fixed identity and a broker configured.
pub fn test_config() -> CoordinatorConfig {
    let mut cfg = CoordinatorConfig::default();
    cfg.identity.farm_id.clear();
    cfg.identity.farm_id.push_str(FARM).unwrap();
    cfg.identity.coord_id.push_str(COORD).unwrap();
    cfg.broker.host.push_str("broker.local").unwrap();
    cfg
}

pub fn peripherals(storage: MockStorage) -> Peripherals<MockPlatform> {
    Peripherals {
        radio: MockRadio::default(),
        wifi: MockWifi::default(),
        broker: MockBroker::default(),
        radar: MockRadar::default(),
        ambient: MockAmbient::default(),
        storage,
    }
}

/// A started coordinator with empty storage and no Wi-Fi credentials.
pub fn started(cfg: CoordinatorConfig) -> (TestCoordinator, RecordingSink) {
    started_with(cfg, MockStorage::default())
}

pub fn started_with(
    cfg: CoordinatorConfig,
    storage: MockStorage,
) -> (TestCoordinator, RecordingSink) {
    let mut coord = Coordinator::new(cfg, peripherals(storage));
    let mut sink = RecordingSink::default();
    coord.begin(0, &mut sink).expect("radio config accepted");
    (coord, sink)
}

/// Storage pre-seeded with Wi-Fi credentials.
pub fn provisioned_storage() -> MockStorage {
    let mut storage = MockStorage::default();
    WifiCredentials::new("FarmNet", "password123")
        .unwrap()
        .store(&mut storage)
        .unwrap();
    storage
}

/// A coordinator whose link and broker session are already up.
#[allow(dead_code)]
pub fn online(cfg: CoordinatorConfig) -> (TestCoordinator, RecordingSink) {
    let (mut coord, mut sink) = started_with(cfg, provisioned_storage());
    // Tick 1: Wi-Fi associates.  Tick 2: broker session comes up.
    coord.tick(10, &mut sink);
    coord.tick(20, &mut sink);
    assert!(coord.uplink().is_up(), "uplink should be up after two ticks");
    coord.uplink_mut().broker_mut().published.clear();
    sink.clear();
    (coord, sink)
}

/// Pair `addr` as `node_id` through an open window.
#[allow(dead_code)]
pub fn pair(coord: &mut TestCoordinator, sink: &mut RecordingSink, addr: MacAddress, node_id: &str, now_ms: u64) {
    use farmcoord::app::commands::AppCommand;
    coord
        .handle_command(AppCommand::OpenPairing { duration_ms: Some(5_000) }, now_ms, sink)
        .unwrap();
    coord
        .radio_mut()
        .driver_mut()
        .inject(addr, &format!(r#"{{"msg":"join_request","node_id":"{node_id}"}}"#));
    coord.tick(now_ms, sink);
    assert!(coord.registry().lookup(node_id).is_some(), "{node_id} should be paired");
}

pub fn mac(last: u8) -> MacAddress {
    [0x24, 0x6F, 0x28, 0xAA, 0xBB, last]
}
