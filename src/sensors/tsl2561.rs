//! TSL2561 ambient light sensor (I²C, address 0x39).
//!
//! Runs at 402 ms integration and 1x gain so grow lights do not saturate
//! the channels; counts are scaled to the 16x reference before the
//! datasheet's piecewise lux approximation (T/FN/CL package).

use embedded_hal::i2c::I2c;

pub const ADDRESS: u8 = 0x39;

const CMD: u8 = 0x80;
const WORD: u8 = 0x20;
const REG_CONTROL: u8 = 0x00;
const REG_TIMING: u8 = 0x01;
const REG_ID: u8 = 0x0A;
const REG_DATA0: u8 = 0x0C;
const REG_DATA1: u8 = 0x0E;

const POWER_ON: u8 = 0x03;
/// Gain 1x, integration 402 ms.
const TIMING_402MS_1X: u8 = 0x02;
const GAIN_SCALE: f32 = 16.0;

pub fn init<I: I2c>(bus: &mut I) -> Result<(), I::Error> {
    bus.write(ADDRESS, &[CMD | REG_CONTROL, POWER_ON])?;
    bus.write(ADDRESS, &[CMD | REG_TIMING, TIMING_402MS_1X])?;
    let mut id = [0u8; 1];
    bus.write_read(ADDRESS, &[CMD | REG_ID], &mut id)?;
    Ok(())
}

fn read_channel<I: I2c>(bus: &mut I, reg: u8) -> Result<u16, I::Error> {
    let mut buf = [0u8; 2];
    bus.write_read(ADDRESS, &[CMD | WORD | reg], &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Raw broadband (ch0) and infrared (ch1) counts.
pub fn read_channels<I: I2c>(bus: &mut I) -> Result<(u16, u16), I::Error> {
    Ok((read_channel(bus, REG_DATA0)?, read_channel(bus, REG_DATA1)?))
}

/// Lux from raw counts.  `None` when either channel is saturated.
pub fn lux(ch0: u16, ch1: u16) -> Option<f32> {
    if ch0 == u16::MAX || ch1 == u16::MAX {
        return None;
    }
    if ch0 == 0 {
        return Some(0.0);
    }
    let c0 = f32::from(ch0) * GAIN_SCALE;
    let c1 = f32::from(ch1) * GAIN_SCALE;
    let ratio = c1 / c0;
    let lux = if ratio <= 0.50 {
        0.0304 * c0 - 0.062 * c0 * ratio.powf(1.4)
    } else if ratio <= 0.61 {
        0.0224 * c0 - 0.031 * c1
    } else if ratio <= 0.80 {
        0.0128 * c0 - 0.0153 * c1
    } else if ratio <= 1.30 {
        0.001_46 * c0 - 0.001_12 * c1
    } else {
        0.0
    };
    Some(lux.max(0.0))
}
