//! Fuzz target: `Ld2450Parser::feed`
//!
//! Drives arbitrary UART bytes through the LD2450 parser and checks that
//! every completed frame decodes to coordinates the sensor can express.
//!
//! cargo fuzz run fuzz_radar_parser

#![no_main]

use farmcoord::radar::ld2450::{Ld2450Parser, encode_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut parser = Ld2450Parser::new();
    parser.feed(data, |result| {
        if let Ok(frame) = result {
            for t in &frame {
                assert!(t.x_mm != i16::MIN && t.y_mm != i16::MIN);
            }
            // A decoded frame re-encodes to something the parser accepts.
            let mut again = Ld2450Parser::new();
            let mut seen = 0;
            again.feed(&encode_frame(&frame), |r| {
                assert_eq!(r, Ok(frame));
                seen += 1;
            });
            assert_eq!(seen, 1);
        }
    });
});
