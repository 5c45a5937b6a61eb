//! Coordinator identity derived from the ESP32 factory MAC address.
//!
//! When no coordinator id is configured, the one used in every topic is
//! `coord-XXYYZZ` (last three MAC bytes, uppercase hex).  The factory MAC
//! is burned into eFuse, so the id is stable across reboots and reflashes.

use core::fmt::Write;

use crate::registry::MacAddress;

pub type CoordId = heapless::String<32>;

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly six bytes into `mac`.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn coord_id(mac: &MacAddress) -> CoordId {
    let mut id = CoordId::new();
    let _ = write!(id, "coord-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}
