//! TMP117 precision temperature sensor (I²C, address 0x48).
//!
//! Continuous conversion mode out of reset; the coordinator only reads the
//! result register.  Registers are big-endian.

use embedded_hal::i2c::I2c;

pub const ADDRESS: u8 = 0x48;

const REG_TEMP: u8 = 0x00;
const REG_DEVICE_ID: u8 = 0x0F;
const DEVICE_ID: u16 = 0x0117;
/// Result register value before the first conversion completes.
const NOT_READY: u16 = 0x8000;
const LSB_C: f32 = 0.007_812_5;

/// Probe the device id.  `Ok(false)` means something else answered.
pub fn init<I: I2c>(bus: &mut I) -> Result<bool, I::Error> {
    let mut buf = [0u8; 2];
    bus.write_read(ADDRESS, &[REG_DEVICE_ID], &mut buf)?;
    Ok(u16::from_be_bytes(buf) & 0x0FFF == DEVICE_ID)
}

/// Temperature in °C, `None` before the first conversion.
pub fn read_celsius<I: I2c>(bus: &mut I) -> Result<Option<f32>, I::Error> {
    let mut buf = [0u8; 2];
    bus.write_read(ADDRESS, &[REG_TEMP], &mut buf)?;
    let raw = u16::from_be_bytes(buf);
    if raw == NOT_READY {
        return Ok(None);
    }
    Ok(Some(f32::from(raw as i16) * LSB_C))
}
