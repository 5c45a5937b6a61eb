//! Fuzz target: `PeerMessage::decode`
//!
//! Whatever arrives over the air must either decode or be rejected as
//! malformed; a decoded frame always re-encodes.
//!
//! cargo fuzz run fuzz_peer_frame

#![no_main]

use farmcoord::radio::frame::PeerMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = PeerMessage::decode(data) {
        let _ = msg.kind();
        let _ = msg.claimed_node_id();
        let _ = msg.encode();
    }
});
