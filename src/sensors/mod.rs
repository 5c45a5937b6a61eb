//! Coordinator-local ambient sensors on one shared I²C bus.
//!
//! [`AmbientSensors`] owns the bus and implements [`AmbientPort`].  A sensor
//! that fails to answer is re-probed on the next read instead of failing
//! the snapshot; its value is simply `None` until it comes back.

pub mod tmp117;
pub mod tsl2561;

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::AmbientPort;

pub struct AmbientSensors<I: I2c> {
    bus: I,
    light_ready: bool,
    temp_ready: bool,
}

impl<I: I2c> AmbientSensors<I> {
    pub fn new(bus: I) -> Self {
        let mut s = Self {
            bus,
            light_ready: false,
            temp_ready: false,
        };
        s.probe_light();
        s.probe_temp();
        s
    }

    pub fn bus_mut(&mut self) -> &mut I {
        &mut self.bus
    }

    fn probe_light(&mut self) -> bool {
        self.light_ready = tsl2561::init(&mut self.bus).is_ok();
        if self.light_ready {
            info!("ambient: TSL2561 ready");
        }
        self.light_ready
    }

    fn probe_temp(&mut self) -> bool {
        self.temp_ready = matches!(tmp117::init(&mut self.bus), Ok(true));
        if self.temp_ready {
            info!("ambient: TMP117 ready");
        }
        self.temp_ready
    }
}

impl<I: I2c> AmbientPort for AmbientSensors<I> {
    fn read_lux(&mut self) -> Option<f32> {
        if !self.light_ready && !self.probe_light() {
            return None;
        }
        match tsl2561::read_channels(&mut self.bus) {
            Ok((ch0, ch1)) => tsl2561::lux(ch0, ch1),
            Err(_) => {
                warn!("ambient: TSL2561 read failed");
                self.light_ready = false;
                None
            }
        }
    }

    fn read_temperature_c(&mut self) -> Option<f32> {
        if !self.temp_ready && !self.probe_temp() {
            return None;
        }
        match tmp117::read_celsius(&mut self.bus) {
            Ok(t) => t,
            Err(_) => {
                warn!("ambient: TMP117 read failed");
                self.temp_ready = false;
                None
            }
        }
    }
}
