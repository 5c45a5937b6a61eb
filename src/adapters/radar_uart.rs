//! Radar UART adapter.
//!
//! The LD2450 streams 30-byte frames at 256000 baud, roughly ten per
//! second.  [`RadarPort::read`] returns whatever the UART RX FIFO holds
//! without waiting, so the tick never stalls on the radar.

use crate::app::ports::RadarPort;

/// LD2450 factory baud rate.
pub const RADAR_BAUD: u32 = 256_000;

#[cfg(target_os = "espidf")]
use esp_idf_hal::uart::UartDriver;

#[cfg(target_os = "espidf")]
pub struct RadarUart {
    uart: UartDriver<'static>,
}

#[cfg(target_os = "espidf")]
impl RadarUart {
    pub fn new(uart: UartDriver<'static>) -> Self {
        log::info!("radar: UART ready at {RADAR_BAUD} baud");
        Self { uart }
    }
}

#[cfg(target_os = "espidf")]
impl RadarPort for RadarUart {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        // Zero-tick timeout: return immediately with what is buffered.
        match self.uart.read(buf, esp_idf_hal::delay::NON_BLOCK) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("radar: UART read failed: {e}");
                0
            }
        }
    }
}

/// Host-side stand-in: bytes pushed with [`RadarUart::push`] are handed
/// out in arrival order.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct RadarUart {
    rx: std::collections::VecDeque<u8>,
}

#[cfg(not(target_os = "espidf"))]
impl RadarUart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }
}

#[cfg(not(target_os = "espidf"))]
impl RadarPort for RadarUart {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *dst = src;
        }
        n
    }
}
