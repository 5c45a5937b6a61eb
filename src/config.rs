//! Coordinator configuration.
//!
//! One typed struct per subsystem, aggregated in [`CoordinatorConfig`].
//! Loaded once at boot from NVS (postcard blobs) and saved explicitly on
//! change.  Wi-Fi credentials live in their own namespace and are never
//! part of the aggregate.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, StorageError, StoragePort};
use crate::registry::ActuatorId;

// ── NVS layout ────────────────────────────────────────────────

/// Connectivity credentials (SSID / passphrase).
pub const WIFI_NAMESPACE: &str = "wifi";
/// Broker endpoint and farm/coordinator identity.
pub const BROKER_NAMESPACE: &str = "broker";
/// Node registry table.
pub const NODES_NAMESPACE: &str = "nodes";
/// Radio, pairing, link, thermal, zone, radar and telemetry settings.
pub const COORD_NAMESPACE: &str = "coord";

pub const CONFIG_KEY: &str = "cfg";
pub const CREDENTIALS_KEY: &str = "creds";

/// Upper bound on any single NVS blob.
pub const MAX_BLOB_SIZE: usize = 4000;

// ── Capacity limits ───────────────────────────────────────────

/// ESP-NOW unencrypted peer limit.
pub const MAX_PEERS: usize = 20;
pub const MAX_ZONES: usize = 8;
pub const MAX_ZONE_ACTUATORS: usize = 8;
/// Four thresholds give the five levels 100/75/50/25/0.
pub const MAX_THRESHOLDS: usize = 4;

// ───────────────────────────────────────────────────────────────
// Subsystem configs
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub farm_id: heapless::String<32>,
    /// Empty means "derive from the factory MAC at boot".
    pub coord_id: heapless::String<32>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let mut farm_id = heapless::String::new();
        let _ = farm_id.push_str("farm001");
        Self {
            farm_id,
            coord_id: heapless::String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: heapless::String<64>,
    pub port: u16,
    pub username: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: heapless::String::new(),
            port: 1883,
            username: heapless::String::new(),
            password: heapless::String::new(),
        }
    }
}

impl BrokerConfig {
    /// `mqtt://host:port`, or `None` when no host is configured.
    pub fn url(&self) -> Option<String> {
        if self.host.is_empty() {
            return None;
        }
        Some(format!("mqtt://{}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Must match the Wi-Fi channel when the uplink is active.
    pub channel: u8,
    pub tx_power_dbm: i8,
    /// Registry capacity; bounded by the radio peer table.
    pub max_peers: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            tx_power_dbm: 20,
            max_peers: MAX_PEERS as u8,
        }
    }
}

/// When an open pairing window closes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingPolicy {
    /// Close after the first admitted node.
    SingleNode,
    /// Close once this many nodes have been admitted in the session.
    ExpectedCount(u8),
    /// Stay open until the window duration elapses.
    UntilTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    pub default_window_ms: u32,
    pub max_window_ms: u32,
    pub policy: PairingPolicy,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            default_window_ms: 60_000,
            max_window_ms: 300_000,
            policy: PairingPolicy::SingleNode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub base_backoff_ms: u32,
    pub max_backoff_ms: u32,
    /// Consecutive failures tolerated before going Offline.
    pub max_failures: u8,
    /// Upper bound on a single non-blocking connect attempt.
    pub connect_timeout_ms: u32,
    /// Offline re-probe period; 0 disables probing.
    pub offline_probe_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            max_failures: 5,
            connect_timeout_ms: 10_000,
            offline_probe_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// Strictly ascending, °C.
    pub thresholds_c: heapless::Vec<f32, MAX_THRESHOLDS>,
    pub hysteresis_c: f32,
    /// Deration level drop per step, percent.
    pub step_pct: u8,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        let mut thresholds_c = heapless::Vec::new();
        for t in [45.0, 50.0, 55.0, 60.0] {
            let _ = thresholds_c.push(t);
        }
        Self {
            thresholds_c,
            hysteresis_c: 3.0,
            step_pct: 25,
        }
    }
}

/// Axis-aligned rectangle in radar coordinates (mm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min_mm: i32,
    pub x_max_mm: i32,
    pub y_min_mm: i32,
    pub y_max_mm: i32,
}

impl Bounds {
    pub const fn new(x_min_mm: i32, x_max_mm: i32, y_min_mm: i32, y_max_mm: i32) -> Self {
        Self {
            x_min_mm,
            x_max_mm,
            y_min_mm,
            y_max_mm,
        }
    }

    pub fn contains(&self, x_mm: i32, y_mm: i32) -> bool {
        (self.x_min_mm..=self.x_max_mm).contains(&x_mm)
            && (self.y_min_mm..=self.y_max_mm).contains(&y_mm)
    }

    fn is_well_formed(&self) -> bool {
        self.x_min_mm < self.x_max_mm && self.y_min_mm < self.y_max_mm
    }
}

/// Zone id → spatial definition and the ordered actuators it drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMapping {
    pub zone_id: heapless::String<16>,
    pub bounds: Bounds,
    pub actuators: heapless::Vec<ActuatorId, MAX_ZONE_ACTUATORS>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Consecutive empty radar updates before a zone is vacated.
    pub vacate_after_updates: u8,
    /// Duty sent to a zone's actuators while occupied / vacant.
    pub occupied_duty: u8,
    pub vacant_duty: u8,
    pub zones: heapless::Vec<ZoneMapping, MAX_ZONES>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        let mut zone_id = heapless::String::new();
        let _ = zone_id.push_str("zone-1");
        let mut zones = heapless::Vec::new();
        let _ = zones.push(ZoneMapping {
            zone_id,
            bounds: Bounds::new(-3000, 3000, 0, 6000),
            actuators: heapless::Vec::new(),
        });
        Self {
            vacate_after_updates: 5,
            occupied_duty: 100,
            vacant_duty: 0,
            zones,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarConfig {
    pub sensor_id: heapless::String<16>,
    /// Target slots per event (LD2450 = 3).
    pub capacity: u8,
    /// Targets outside this area are reported with `in_zone = false`.
    pub detection: Bounds,
    /// Radar link counts as offline after this long without a frame.
    pub stale_after_ms: u32,
}

impl Default for RadarConfig {
    fn default() -> Self {
        let mut sensor_id = heapless::String::new();
        let _ = sensor_id.push_str("ld2450");
        Self {
            sensor_id,
            capacity: 3,
            detection: Bounds::new(-4000, 4000, 0, 6000),
            stale_after_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub coordinator_interval_ms: u32,
    /// Interval handed to nodes in the join accept.
    pub node_interval_ms: u32,
    pub stale_node_ms: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            coordinator_interval_ms: 5_000,
            node_interval_ms: 30_000,
            stale_node_ms: 300_000,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Aggregate
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    // --- Uplink identity ---
    pub identity: IdentityConfig,
    pub broker: BrokerConfig,

    // --- Peer radio ---
    pub radio: RadioConfig,
    pub pairing: PairingConfig,

    // --- Wi-Fi link ---
    pub link: LinkConfig,

    // --- Control ---
    pub thermal: ThermalConfig,
    pub zones: ZoneConfig,
    pub radar: RadarConfig,

    // --- Timing ---
    pub telemetry: TelemetryConfig,
}

impl CoordinatorConfig {
    /// Range-check every field.  Called before any save and on boot load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.farm_id.is_empty() {
            return Err(ConfigError::ValidationFailed("farm_id must not be empty"));
        }
        if !(1..=13).contains(&self.radio.channel) {
            return Err(ConfigError::ValidationFailed("radio.channel must be 1-13"));
        }
        if !(2..=20).contains(&self.radio.tx_power_dbm) {
            return Err(ConfigError::ValidationFailed("radio.tx_power_dbm must be 2-20"));
        }
        if self.radio.max_peers == 0 || usize::from(self.radio.max_peers) > MAX_PEERS {
            return Err(ConfigError::ValidationFailed("radio.max_peers must be 1-20"));
        }
        if self.pairing.default_window_ms == 0
            || self.pairing.default_window_ms > self.pairing.max_window_ms
        {
            return Err(ConfigError::ValidationFailed(
                "pairing.default_window_ms must be 1..=max_window_ms",
            ));
        }
        if let PairingPolicy::ExpectedCount(0) = self.pairing.policy {
            return Err(ConfigError::ValidationFailed("pairing expected count must be > 0"));
        }
        if self.link.base_backoff_ms == 0 || self.link.base_backoff_ms > self.link.max_backoff_ms {
            return Err(ConfigError::ValidationFailed(
                "link.base_backoff_ms must be 1..=max_backoff_ms",
            ));
        }
        if self.link.max_failures == 0 {
            return Err(ConfigError::ValidationFailed("link.max_failures must be > 0"));
        }
        if self.thermal.thresholds_c.is_empty() {
            return Err(ConfigError::ValidationFailed("thermal.thresholds_c must not be empty"));
        }
        if self.thermal.thresholds_c.iter().any(|t| !t.is_finite()) {
            return Err(ConfigError::ValidationFailed("thermal.thresholds_c must be finite"));
        }
        if self.thermal.thresholds_c.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::ValidationFailed(
                "thermal.thresholds_c must be strictly ascending",
            ));
        }
        if !(self.thermal.hysteresis_c > 0.0 && self.thermal.hysteresis_c < 20.0) {
            return Err(ConfigError::ValidationFailed("thermal.hysteresis_c must be in (0, 20)"));
        }
        if !(1..=100).contains(&self.thermal.step_pct) {
            return Err(ConfigError::ValidationFailed("thermal.step_pct must be 1-100"));
        }
        // The hottest level must switch the output off.
        if usize::from(self.thermal.step_pct) * self.thermal.thresholds_c.len() < 100 {
            return Err(ConfigError::ValidationFailed(
                "thermal.step_pct * thresholds must reach 100",
            ));
        }
        if self.zones.vacate_after_updates == 0 {
            return Err(ConfigError::ValidationFailed("zones.vacate_after_updates must be > 0"));
        }
        if self.zones.occupied_duty > 100 || self.zones.vacant_duty > 100 {
            return Err(ConfigError::ValidationFailed("zone duties must be 0-100"));
        }
        if self.zones.zones.iter().any(|z| !z.bounds.is_well_formed()) {
            return Err(ConfigError::ValidationFailed("zone bounds must have min < max"));
        }
        if !(3..=4).contains(&self.radar.capacity) {
            return Err(ConfigError::ValidationFailed("radar.capacity must be 3 or 4"));
        }
        if self.telemetry.coordinator_interval_ms < 1_000 {
            return Err(ConfigError::ValidationFailed(
                "telemetry.coordinator_interval_ms must be >= 1000",
            ));
        }
        Ok(())
    }
}

// ── Namespace split ───────────────────────────────────────────
//
// Postcard is positional, so the borrowed and owned section types must
// keep identical field order.

#[derive(Serialize)]
struct BrokerSectionRef<'a> {
    identity: &'a IdentityConfig,
    broker: &'a BrokerConfig,
}

#[derive(Deserialize)]
struct BrokerSection {
    identity: IdentityConfig,
    broker: BrokerConfig,
}

#[derive(Serialize)]
struct ControlSectionRef<'a> {
    radio: &'a RadioConfig,
    pairing: &'a PairingConfig,
    link: &'a LinkConfig,
    thermal: &'a ThermalConfig,
    zones: &'a ZoneConfig,
    radar: &'a RadarConfig,
    telemetry: &'a TelemetryConfig,
}

#[derive(Deserialize)]
struct ControlSection {
    radio: RadioConfig,
    pairing: PairingConfig,
    link: LinkConfig,
    thermal: ThermalConfig,
    zones: ZoneConfig,
    radar: RadarConfig,
    telemetry: TelemetryConfig,
}

/// Read both config namespaces; missing sections fall back to defaults.
pub fn load_config(storage: &impl StoragePort) -> Result<CoordinatorConfig, ConfigError> {
    let mut cfg = CoordinatorConfig::default();
    if let Some(section) = load_blob::<BrokerSection>(storage, BROKER_NAMESPACE, CONFIG_KEY)? {
        cfg.identity = section.identity;
        cfg.broker = section.broker;
    }
    if let Some(section) = load_blob::<ControlSection>(storage, COORD_NAMESPACE, CONFIG_KEY)? {
        cfg.radio = section.radio;
        cfg.pairing = section.pairing;
        cfg.link = section.link;
        cfg.thermal = section.thermal;
        cfg.zones = section.zones;
        cfg.radar = section.radar;
        cfg.telemetry = section.telemetry;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Validate, then write both config namespaces.
pub fn save_config(
    storage: &mut impl StoragePort,
    cfg: &CoordinatorConfig,
) -> Result<(), ConfigError> {
    cfg.validate()?;
    store_blob(
        storage,
        BROKER_NAMESPACE,
        CONFIG_KEY,
        &BrokerSectionRef {
            identity: &cfg.identity,
            broker: &cfg.broker,
        },
    )?;
    store_blob(
        storage,
        COORD_NAMESPACE,
        CONFIG_KEY,
        &ControlSectionRef {
            radio: &cfg.radio,
            pairing: &cfg.pairing,
            link: &cfg.link,
            thermal: &cfg.thermal,
            zones: &cfg.zones,
            radar: &cfg.radar,
            telemetry: &cfg.telemetry,
        },
    )
}

// ── Blob helpers ──────────────────────────────────────────────

/// Read and decode a postcard blob.  `Ok(None)` when the key is absent.
pub fn load_blob<T: DeserializeOwned>(
    storage: &impl StoragePort,
    namespace: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let mut buf = vec![0u8; MAX_BLOB_SIZE];
    match storage.read(namespace, key, &mut buf) {
        Ok(len) => postcard::from_bytes(&buf[..len])
            .map(Some)
            .map_err(|_| ConfigError::Corrupted),
        Err(StorageError::NotFound) => Ok(None),
        Err(_) => Err(ConfigError::IoError),
    }
}

pub fn store_blob<T: Serialize>(
    storage: &mut impl StoragePort,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<(), ConfigError> {
    let bytes = postcard::to_allocvec(value).map_err(|_| ConfigError::IoError)?;
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(ConfigError::StorageFull);
    }
    storage.write(namespace, key, &bytes).map_err(|e| match e {
        StorageError::Full => ConfigError::StorageFull,
        _ => ConfigError::IoError,
    })
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi credentials
// ───────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl core::fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

impl WifiCredentials {
    /// SSID: 1-32 printable ASCII.  Password: empty (open) or 8-64 bytes.
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConfigError> {
        if ssid.is_empty() || !is_printable_ascii(ssid) {
            return Err(ConfigError::ValidationFailed("ssid must be 1-32 printable ASCII"));
        }
        if !password.is_empty() && !(8..=64).contains(&password.len()) {
            return Err(ConfigError::ValidationFailed("password must be empty or 8-64 bytes"));
        }
        let mut out = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        out.ssid
            .push_str(ssid)
            .map_err(|()| ConfigError::ValidationFailed("ssid must be 1-32 printable ASCII"))?;
        out.password
            .push_str(password)
            .map_err(|()| ConfigError::ValidationFailed("password must be empty or 8-64 bytes"))?;
        Ok(out)
    }

    pub fn load(storage: &impl StoragePort) -> Result<Option<Self>, ConfigError> {
        load_blob(storage, WIFI_NAMESPACE, CREDENTIALS_KEY)
    }

    pub fn store(&self, storage: &mut impl StoragePort) -> Result<(), ConfigError> {
        store_blob(storage, WIFI_NAMESPACE, CREDENTIALS_KEY, self)
    }
}
