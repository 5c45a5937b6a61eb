//! Local pairing trigger.
//!
//! Maps button gestures to coordinator commands:
//!
//! | Gesture      | Command                        |
//! |--------------|--------------------------------|
//! | Short press  | open pairing (default window)  |
//! | Double press | close pairing                  |
//! | Long press   | unpair every node              |
//!
//! The uplink path (`pair` / `pairing.start` commands) produces the same
//! [`AppCommand::OpenPairing`], so both triggers land in one handler.

use embedded_hal::digital::InputPin;
use log::info;

use crate::app::commands::AppCommand;
use crate::drivers::button::{ButtonDriver, ButtonEvent};

/// Gesture → command mapping.
pub fn command_for(event: ButtonEvent) -> AppCommand {
    match event {
        ButtonEvent::ShortPress => AppCommand::OpenPairing { duration_ms: None },
        ButtonEvent::DoublePress => AppCommand::ClosePairing,
        ButtonEvent::LongPress => AppCommand::UnpairAll,
    }
}

pub struct PairingTrigger<P: InputPin> {
    button: ButtonDriver<P>,
}

impl<P: InputPin> PairingTrigger<P> {
    pub fn new(pin: P) -> Self {
        Self {
            button: ButtonDriver::new(pin),
        }
    }

    pub fn button_mut(&mut self) -> &mut ButtonDriver<P> {
        &mut self.button
    }

    /// Sample the button; returns a command when a gesture completes.
    pub fn poll(&mut self, now_ms: u64) -> Option<AppCommand> {
        let event = self.button.tick(now_ms)?;
        info!("trigger: {:?}", event);
        Some(command_for(event))
    }
}
