//! GPIO / peripheral pin assignments for the coordinator board.
//!
//! Single source of truth: `main` wires peripherals from these constants
//! rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Pairing button (active-low with external pull-up)
// ---------------------------------------------------------------------------

pub const BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// I²C bus: TSL2561 light sensor + TMP117 temperature sensor
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;
/// Both sensors support fast mode.
pub const I2C_FREQ_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// LD2450 mmWave radar (UART1)
// ---------------------------------------------------------------------------

/// Coordinator TX → radar RX.
pub const RADAR_TX_GPIO: i32 = 17;
/// Radar TX → coordinator RX.
pub const RADAR_RX_GPIO: i32 = 18;
