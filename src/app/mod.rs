//! Application core: coordinator domain logic behind port traits.
//!
//! [`coordinator::Coordinator`] ties the registry, peer radio, link,
//! uplink, radar, zone and thermal components into one tick.  Every
//! hardware interaction goes through the traits in [`ports`], so the
//! whole layer is exercised on the host with mock adapters.

pub mod commands;
pub mod coordinator;
pub mod events;
pub mod ports;
