//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that drives the coordinator through
//! `begin` / `tick` / `handle_command` against mock adapters.  All tests
//! run on the host with no hardware.

mod coordinator_tests;
mod link_flow_tests;
mod mock_hw;
mod pairing_flow_tests;
mod uplink_flow_tests;
