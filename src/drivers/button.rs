//! Polled, debounced button with short, long and double press detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up (the BOOT button on most
//! ESP32-S3 boards).  The level is sampled from the control loop through
//! any `embedded-hal` [`InputPin`]; no interrupt is needed at tick rate.
//!
//! ## Gesture detection
//!
//! | Gesture      | Condition                              | Event         |
//! |--------------|----------------------------------------|---------------|
//! | Short press  | Release, no second press within 300 ms | `ShortPress`  |
//! | Long press   | Hold >= 10 s                           | `LongPress`   |
//! | Double press | Second press within 300 ms of release  | `DoublePress` |

use embedded_hal::digital::InputPin;

const DEBOUNCE_MS: u64 = 50;
const LONG_PRESS_MS: u64 = 10_000;
const DOUBLE_PRESS_WINDOW_MS: u64 = 300;

/// Button events emitted after gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
    DoublePress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u64 },
    Pressed { since_ms: u64 },
    WaitSecondPress { first_release_ms: u64 },
    /// Gesture already reported; ignore until released.
    WaitRelease,
}

pub struct ButtonDriver<P: InputPin> {
    pin: P,
    state: GestureState,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            state: GestureState::Idle,
        }
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }

    fn is_pressed(&mut self) -> bool {
        // A pin read error counts as released.
        self.pin.is_low().unwrap_or(false)
    }

    /// Call from the main loop at each control tick.
    pub fn tick(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        let pressed = self.is_pressed();

        match self.state {
            GestureState::Idle => {
                if pressed {
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                } else if now_ms.saturating_sub(since_ms) >= DEBOUNCE_MS {
                    self.state = GestureState::Pressed { since_ms };
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                if !pressed {
                    self.state = GestureState::WaitSecondPress {
                        first_release_ms: now_ms,
                    };
                } else if now_ms.saturating_sub(since_ms) >= LONG_PRESS_MS {
                    self.state = GestureState::WaitRelease;
                    return Some(ButtonEvent::LongPress);
                }
                None
            }

            GestureState::WaitSecondPress { first_release_ms } => {
                let gap = now_ms.saturating_sub(first_release_ms);
                if pressed && gap <= DOUBLE_PRESS_WINDOW_MS {
                    self.state = GestureState::WaitRelease;
                    return Some(ButtonEvent::DoublePress);
                }
                if gap > DOUBLE_PRESS_WINDOW_MS {
                    self.state = if pressed {
                        GestureState::DebounceWait { since_ms: now_ms }
                    } else {
                        GestureState::Idle
                    };
                    return Some(ButtonEvent::ShortPress);
                }
                None
            }

            GestureState::WaitRelease => {
                if !pressed {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }
}
