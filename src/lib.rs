//! FarmCoord firmware library.
//!
//! Exposes the pure-logic modules for integration testing and fuzzing.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; host builds get simulation adapters instead.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod link;
pub mod radar;
pub mod radio;
pub mod registry;
pub mod thermal;
pub mod trigger;
pub mod uplink;
pub mod zones;

pub mod adapters;
pub mod drivers;
pub mod pins;
pub mod sensors;
