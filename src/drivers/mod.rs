//! Local peripheral drivers.

pub mod button;
pub mod watchdog;
