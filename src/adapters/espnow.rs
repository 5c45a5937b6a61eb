//! ESP-NOW peer radio adapter.
//!
//! Implements [`RadioPort`].  The receive callback runs in the Wi-Fi task,
//! so it does nothing but copy the frame into the rx ring via
//! [`events::enqueue_frame`]; all decoding happens later in the tick.
//!
//! The adapter keeps its own mirror of the driver peer table so
//! [`RadioPort::peers`] never has to walk the IDF list.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::RadioPort;
use crate::config::MAX_PEERS;
use crate::error::{LinkError, RadioConfigError};
use crate::events::{self, RxProducer};
use crate::registry::MacAddress;

#[cfg(target_os = "espidf")]
use esp_idf_svc::espnow::{EspNow, PeerInfo, ReceiveInfo};

type PeerTable = heapless::Vec<MacAddress, MAX_PEERS>;

fn forget(table: &mut PeerTable, addr: &MacAddress) {
    table.retain(|a| a != addr);
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct EspNowRadio {
    espnow: EspNow<'static>,
    peers: PeerTable,
    channel: u8,
}

#[cfg(target_os = "espidf")]
impl EspNowRadio {
    /// Wi-Fi must already be started in STA mode.
    pub fn new() -> Result<Self, RadioConfigError> {
        let espnow = EspNow::take().map_err(|e| {
            warn!("espnow: init failed: {e}");
            RadioConfigError::DriverInit
        })?;
        info!("espnow: driver ready");
        Ok(Self {
            espnow,
            peers: PeerTable::new(),
            channel: 0,
        })
    }
}

#[cfg(target_os = "espidf")]
impl RadioPort for EspNowRadio {
    fn configure(&mut self, channel: u8, tx_power_dbm: i8) -> Result<(), RadioConfigError> {
        use esp_idf_svc::sys::{
            esp_wifi_set_channel, esp_wifi_set_max_tx_power, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE,
            ESP_OK,
        };
        // SAFETY: plain driver setters; Wi-Fi is started before this adapter exists.
        let ret = unsafe { esp_wifi_set_channel(channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE) };
        if ret != ESP_OK {
            warn!("espnow: set channel {channel} failed ({ret})");
            return Err(RadioConfigError::InvalidChannel);
        }
        // IDF takes quarter-dBm units.
        // SAFETY: as above.
        let ret = unsafe { esp_wifi_set_max_tx_power(tx_power_dbm.saturating_mul(4)) };
        if ret != ESP_OK {
            warn!("espnow: set tx power {tx_power_dbm} dBm failed ({ret})");
            return Err(RadioConfigError::InvalidPower);
        }
        self.channel = channel;
        Ok(())
    }

    fn start_receive(&mut self, mut producer: RxProducer) -> Result<(), RadioConfigError> {
        self.espnow
            .register_recv_cb(move |info: &ReceiveInfo, data: &[u8]| {
                events::enqueue_frame(&mut producer, *info.src_addr, data);
            })
            .map_err(|e| {
                warn!("espnow: register rx callback failed: {e}");
                RadioConfigError::DriverInit
            })?;
        info!("espnow: receive callback installed");
        Ok(())
    }

    fn add_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError> {
        if self.peers.contains(addr) {
            return Ok(());
        }
        if self.peers.is_full() {
            return Err(LinkError::RadioFailure);
        }
        let peer = PeerInfo {
            peer_addr: *addr,
            channel: self.channel,
            ifidx: esp_idf_svc::sys::wifi_interface_t_WIFI_IF_STA,
            encrypt: false,
            ..Default::default()
        };
        self.espnow.add_peer(peer).map_err(|e| {
            warn!("espnow: add peer {addr:02X?} failed: {e}");
            LinkError::RadioFailure
        })?;
        self.peers.push(*addr).map_err(|_| LinkError::RadioFailure)
    }

    fn remove_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError> {
        if self.espnow.peer_exists(*addr).unwrap_or(false) {
            self.espnow.del_peer(*addr).map_err(|e| {
                warn!("espnow: del peer {addr:02X?} failed: {e}");
                LinkError::RadioFailure
            })?;
        }
        forget(&mut self.peers, addr);
        Ok(())
    }

    fn has_peer(&self, addr: &MacAddress) -> bool {
        self.peers.contains(addr)
    }

    fn peers(&self) -> PeerTable {
        self.peers.clone()
    }

    fn send(&mut self, addr: &MacAddress, payload: &[u8]) -> Result<(), LinkError> {
        self.espnow.send(*addr, payload).map_err(|e| {
            warn!("espnow: send to {addr:02X?} failed: {e}");
            LinkError::RadioFailure
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Loopback radio: frames "received" are injected by the host, frames sent
/// are recorded.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct EspNowRadio {
    producer: Option<RxProducer>,
    peers: PeerTable,
    sent: Vec<(MacAddress, Vec<u8>)>,
    channel: u8,
}

#[cfg(not(target_os = "espidf"))]
impl EspNowRadio {
    pub fn new() -> Result<Self, RadioConfigError> {
        info!("espnow(sim): loopback radio");
        Ok(Self::default())
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Deliver a frame as if it arrived over the air.
    pub fn inject(&mut self, src: MacAddress, data: &[u8]) -> bool {
        self.producer
            .as_mut()
            .is_some_and(|p| events::enqueue_frame(p, src, data))
    }

    /// Frames sent since the last call.
    pub fn take_sent(&mut self) -> Vec<(MacAddress, Vec<u8>)> {
        core::mem::take(&mut self.sent)
    }
}

#[cfg(not(target_os = "espidf"))]
impl RadioPort for EspNowRadio {
    fn configure(&mut self, channel: u8, _tx_power_dbm: i8) -> Result<(), RadioConfigError> {
        self.channel = channel;
        Ok(())
    }

    fn start_receive(&mut self, producer: RxProducer) -> Result<(), RadioConfigError> {
        self.producer = Some(producer);
        Ok(())
    }

    fn add_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError> {
        if self.peers.contains(addr) {
            return Ok(());
        }
        self.peers.push(*addr).map_err(|_| LinkError::RadioFailure)
    }

    fn remove_peer(&mut self, addr: &MacAddress) -> Result<(), LinkError> {
        forget(&mut self.peers, addr);
        Ok(())
    }

    fn has_peer(&self, addr: &MacAddress) -> bool {
        self.peers.contains(addr)
    }

    fn peers(&self) -> PeerTable {
        self.peers.clone()
    }

    fn send(&mut self, addr: &MacAddress, payload: &[u8]) -> Result<(), LinkError> {
        if !self.peers.contains(addr) {
            return Err(LinkError::UnknownPeer);
        }
        self.sent.push((*addr, payload.to_vec()));
        Ok(())
    }
}
