//! Fuzz target: `LineDecoder::feed` and `classify`
//!
//! Drives arbitrary byte sequences into the streaming line decoder and
//! classifies every line it yields.  Lines must stay within the buffer
//! and never carry their terminator.
//!
//! cargo fuzz run fuzz_line_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaylink::relay::codec::{LineDecoder, MAX_LINE_LEN};
use relaylink::relay::engine::classify;

fuzz_target!(|data: &[u8]| {
    let mut decoder = LineDecoder::new();

    for &byte in data {
        if let Some(line) = decoder.feed(byte) {
            assert!(line.len() <= MAX_LINE_LEN, "line exceeds MAX_LINE_LEN");
            assert!(!line.contains(&b'\n'), "line kept its terminator");
            let _ = classify(String::from_utf8_lossy(line).trim());
        }
    }

    decoder.reset();
    assert_eq!(decoder.pending(), 0);
});
