//! Wi-Fi station-mode adapter.
//!
//! Implements [`WifiPort`], the non-blocking connect surface the
//! [`LinkManager`](crate::link::LinkManager) drives.  Backoff, failure
//! counting and the Offline state all live in the link manager; this
//! adapter only starts an association and reports how it is going.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi`.  The driver
//!   is started in STA mode at construction even without credentials,
//!   because the peer radio rides on the same interface.
//! - **all other targets**: a simulation that associates on the first poll.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConnectPoll, WifiPort};
use crate::config::WifiCredentials;
use crate::error::UplinkError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiAdapter {
    wifi: EspWifi<'static>,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    /// Take over a constructed driver and start it in STA mode.
    pub fn new(mut wifi: EspWifi<'static>) -> anyhow::Result<Self> {
        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        info!("wifi: STA started");
        Ok(Self { wifi })
    }
}

#[cfg(target_os = "espidf")]
impl WifiPort for WifiAdapter {
    fn begin_connect(&mut self, creds: &WifiCredentials) -> Result<(), UplinkError> {
        let client = ClientConfiguration {
            ssid: creds
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| UplinkError::Disconnected)?,
            password: creds
                .password
                .as_str()
                .try_into()
                .map_err(|_| UplinkError::Disconnected)?,
            auth_method: if creds.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|e| {
                warn!("wifi: set_configuration failed: {e}");
                UplinkError::Disconnected
            })?;
        // esp_wifi_connect() returns immediately; association runs in the
        // driver task.
        self.wifi.connect().map_err(|e| {
            warn!("wifi: connect failed: {e}");
            UplinkError::Disconnected
        })?;
        info!("wifi: associating with '{}'", creds.ssid);
        Ok(())
    }

    fn poll_connect(&mut self) -> ConnectPoll {
        match (self.wifi.is_connected(), self.wifi.is_up()) {
            (Ok(true), Ok(true)) => ConnectPoll::Connected,
            (Err(_), _) | (_, Err(_)) => ConnectPoll::Failed,
            _ => ConnectPoll::Pending,
        }
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("wifi: disconnect failed: {e}");
        }
    }

    fn rssi(&self) -> Option<i8> {
        if !self.is_connected() {
            return None;
        }
        let mut info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: `info` is a valid out-pointer for the duration of the call.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(info.rssi)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct WifiAdapter {
    ssid: heapless::String<32>,
    connecting: bool,
    connected: bool,
    attempts: u32,
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Drop the association, as if the AP went away.
    pub fn drop_link(&mut self) {
        self.connected = false;
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiPort for WifiAdapter {
    fn begin_connect(&mut self, creds: &WifiCredentials) -> Result<(), UplinkError> {
        self.ssid = creds.ssid.clone();
        self.attempts = self.attempts.wrapping_add(1);
        self.connecting = true;
        self.connected = false;
        info!("wifi(sim): associating with '{}'", self.ssid);
        Ok(())
    }

    fn poll_connect(&mut self) -> ConnectPoll {
        if self.connecting {
            self.connecting = false;
            self.connected = true;
            info!("wifi(sim): connected to '{}'", self.ssid);
        }
        if self.connected {
            ConnectPoll::Connected
        } else {
            ConnectPoll::Failed
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connecting = false;
        self.connected = false;
    }

    fn rssi(&self) -> Option<i8> {
        self.connected.then_some(-60)
    }
}
