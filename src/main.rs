//! FarmCoord firmware entry point.
//!
//! Hexagonal architecture with a single cooperative tick loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspNowRadio   WifiAdapter   MqttAdapter   RadarUart           │
//! │  (RadioPort)   (WifiPort)    (BrokerPort)  (RadarPort)         │
//! │  AmbientSensors   NvsAdapter       LogEventSink                │
//! │  (AmbientPort)    (StoragePort)    (EventSink)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Coordinator (pure logic)                  │    │
//! │  │  Registry · PeerRadio · Link · Uplink · Zones · Thermal│    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  PairingTrigger (button) · Watchdog                            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals as Board;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;

use farmcoord::adapters::device_id;
use farmcoord::adapters::espnow::EspNowRadio;
use farmcoord::adapters::log_sink::LogEventSink;
use farmcoord::adapters::mqtt::MqttAdapter;
use farmcoord::adapters::nvs::NvsAdapter;
use farmcoord::adapters::radar_uart::{RADAR_BAUD, RadarUart};
use farmcoord::adapters::time::MonotonicClock;
use farmcoord::adapters::wifi::WifiAdapter;
use farmcoord::app::coordinator::{Coordinator, Peripherals};
use farmcoord::app::ports::{ConfigPort, Platform};
use farmcoord::config::{CoordinatorConfig, WifiCredentials};
use farmcoord::drivers::watchdog::Watchdog;
use farmcoord::pins;
use farmcoord::sensors::AmbientSensors;
use farmcoord::trigger::PairingTrigger;

/// Loop period.  Radar frames arrive every ~100 ms; 20 ms keeps the UART
/// FIFO and the rx ring well clear of overflow.
const TICK_MS: u32 = 20;

// ── Platform binding ──────────────────────────────────────────

struct Esp32;

impl Platform for Esp32 {
    type Radio = EspNowRadio;
    type Wifi = WifiAdapter;
    type Broker = MqttAdapter;
    type Radar = RadarUart;
    type Ambient = AmbientSensors<I2cDriver<'static>>;
    type Storage = NvsAdapter;
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  FarmCoord v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let board = Board::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let clock = MonotonicClock::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let mut config = match nvs.load_config() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            CoordinatorConfig::default()
        }
    };
    if config.identity.coord_id.is_empty() {
        config.identity.coord_id = device_id::coord_id(&device_id::read_mac());
    }
    info!(
        "Identity: farm '{}', coordinator '{}'",
        config.identity.farm_id, config.identity.coord_id
    );
    seed_credentials(&mut nvs);

    // ── 3. Construct adapters ─────────────────────────────────
    // Wi-Fi has to be started before ESP-NOW can initialise.
    let wifi = WifiAdapter::new(EspWifi::new(board.modem, sysloop, None)?)?;
    let radio = match EspNowRadio::new() {
        Ok(r) => r,
        Err(e) => halt(&format!("ESP-NOW init failed: {e}")),
    };

    // SAFETY: pin numbers come from `pins` and are not claimed elsewhere.
    let (sda, scl, radar_tx, radar_rx, button_pin) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
            AnyIOPin::new(pins::RADAR_TX_GPIO),
            AnyIOPin::new(pins::RADAR_RX_GPIO),
            AnyIOPin::new(pins::BUTTON_GPIO),
        )
    };

    let i2c = I2cDriver::new(
        board.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let ambient = AmbientSensors::new(i2c);

    let uart = UartDriver::new(
        board.uart1,
        radar_tx,
        radar_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::default().baudrate(Hertz(RADAR_BAUD)),
    )?;
    let radar = RadarUart::new(uart);

    let mut button = PinDriver::input(button_pin)?;
    button.set_pull(Pull::Up)?;
    let mut trigger = PairingTrigger::new(button);

    // ── 4. Construct the coordinator ──────────────────────────
    let mut sink = LogEventSink::new();
    let mut coordinator: Coordinator<Esp32> = Coordinator::new(
        config,
        Peripherals {
            radio,
            wifi,
            broker: MqttAdapter::new(),
            radar,
            ambient,
            storage: nvs,
        },
    );

    if let Err(e) = coordinator.begin(clock.now_ms(), &mut sink) {
        halt(&format!("radio configuration rejected: {e}"));
    }

    let mut watchdog = Watchdog::default();
    info!("System ready. Entering tick loop.");

    // ── 5. Tick loop ──────────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();

        if let Some(cmd) = trigger.poll(now_ms) {
            // Failures are already logged and emitted by the coordinator.
            let _ = coordinator.handle_command(cmd, now_ms, &mut sink);
        }

        coordinator.tick(now_ms, &mut sink);

        watchdog.feed();
        FreeRtos::delay_ms(TICK_MS);
    }
}

/// Store build-time credentials when NVS has none.
fn seed_credentials(nvs: &mut NvsAdapter) {
    let (Some(ssid), Some(password)) = (
        option_env!("FARMCOORD_WIFI_SSID"),
        option_env!("FARMCOORD_WIFI_PASS"),
    ) else {
        return;
    };
    if !matches!(WifiCredentials::load(nvs), Ok(None)) {
        return;
    }
    match WifiCredentials::new(ssid, password).and_then(|c| c.store(nvs)) {
        Ok(()) => info!("Wi-Fi credentials seeded for '{}'", ssid),
        Err(e) => warn!("Wi-Fi credential seed rejected: {}", e),
    }
}

/// Boot cannot continue.  The watchdog is never armed, so the board sits
/// here with the diagnostic on the console until it is reflashed or
/// power-cycled.
fn halt(reason: &str) -> ! {
    error!("{reason}, halting");
    loop {
        FreeRtos::delay_ms(1_000);
    }
}
