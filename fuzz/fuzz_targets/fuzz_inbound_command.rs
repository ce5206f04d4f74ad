//! Fuzz target: `CommandGateway::handle_inbound`
//!
//! Arbitrary payloads must never panic the gateway, and a rejected payload
//! must leave the dedup window exactly as it was.
//!
//! cargo fuzz run fuzz_inbound_command

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaylink::gateway::{CommandGateway, GatewayOutcome};

fuzz_target!(|data: &[u8]| {
    let mut gateway = CommandGateway::new();
    let _ = gateway.handle_inbound(br#"{"script":"STRING seed","password":"1234"}"#, "1234", 0);
    let before = gateway.window().clone();

    match gateway.handle_inbound(data, "1234", 1) {
        GatewayOutcome::Accepted(cmd) => assert!(!cmd.script.is_empty()),
        _ => assert_eq!(gateway.window(), &before),
    }
});
