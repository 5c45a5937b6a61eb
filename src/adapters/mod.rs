//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements   | Connects to                    |
//! |--------------|--------------|--------------------------------|
//! | `espnow`     | RadioPort    | ESP-NOW peer radio             |
//! | `wifi`       | WifiPort     | ESP-IDF WiFi STA               |
//! | `mqtt`       | BrokerPort   | ESP-IDF MQTT client            |
//! | `radar_uart` | RadarPort    | LD2450 on UART1                |
//! | `nvs`        | StoragePort  | NVS / in-memory store          |
//! |              | ConfigPort   | (blanket impl over storage)    |
//! | `log_sink`   | EventSink    | Serial log output              |
//! | `time`       | (none)       | ESP32 system timer             |
//! | `device_id`  | (none)       | eFuse base MAC                 |
//!
//! Ambient sensors live in [`crate::sensors`]; they only need an
//! `embedded-hal` I²C bus.
//!
//! Every adapter has a host-side simulation behind
//! `#[cfg(not(target_os = "espidf"))]`.

pub mod device_id;
pub mod espnow;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod radar_uart;
pub mod time;
pub mod wifi;
