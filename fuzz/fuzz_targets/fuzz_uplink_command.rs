//! Fuzz target: `parse_command` on every inbound route.
//!
//! cargo fuzz run fuzz_uplink_command

#![no_main]

use farmcoord::uplink::payload::parse_command;
use farmcoord::uplink::topics::{Route, TopicMap};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the route, the rest is the payload.
    let Some((&sel, payload)) = data.split_first() else {
        return;
    };
    let route = match sel % 3 {
        0 => Route::Coordinator,
        1 => Route::Tower("T7"),
        _ => Route::Reservoir,
    };
    if let Ok(parsed) = parse_command(route, payload) {
        assert!(parsed.name.len() <= 24);
        assert_eq!(parsed.name.as_str(), parsed.name.to_ascii_lowercase());
    }

    // Topic routing must never panic on arbitrary text either.
    if let Ok(topic) = core::str::from_utf8(payload) {
        let _ = TopicMap::new("farm001", "coord-A1B2C3").route(topic);
    }
});
