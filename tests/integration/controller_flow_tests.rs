//! Integration tests: RelayController → FSM → gateway → relay → board.

use relaylink::app::events::AppEvent;
use relaylink::fsm::{DeviceMode, StateId};
use relaylink::gateway::RejectReason;
use relaylink::relay::TelemetryReport;

use crate::mock_hw::{BoardCall, HOME_PASS, HOME_SSID, MemEeprom, Rig, SECRET};

const TELEMETRY_TOPIC: &str = "LDrago_windows/pico_execution_done";
const COMMAND_TOPIC: &str = "LDrago_windows/ducky_script";

// ── Boot decisions ────────────────────────────────────────────

#[test]
fn blank_store_boots_into_provisioning() {
    let mut rig = Rig::new(MemEeprom::blank());
    rig.boot();

    assert_eq!(rig.app.state(), StateId::Provisioning);
    assert!(rig.sink.contains(&AppEvent::Started(DeviceMode::Provisioning)));
    assert!(
        rig.board
            .calls
            .contains(&BoardCall::StartAccessPoint("LaptopControl_Config".into()))
    );
    assert!(rig.board.portal_active);
}

#[test]
fn reset_trigger_erases_stored_network() {
    let mut rig = Rig::new(MemEeprom::provisioned(HOME_SSID, HOME_PASS, "custom"));
    rig.board.reset_held = true;
    rig.boot();

    assert_eq!(rig.app.state(), StateId::Provisioning);
    assert!(rig.app.store().network().is_none());
    assert_eq!(rig.app.store().secret().as_str(), SECRET);
    assert!(rig.app.store().eeprom().image.iter().all(|b| *b == 0));
}

#[test]
fn failed_erase_restarts_device() {
    let mut eeprom = MemEeprom::provisioned(HOME_SSID, HOME_PASS, SECRET);
    eeprom.write_budget = Some(0);
    let mut rig = Rig::new(eeprom);
    rig.board.reset_held = true;
    rig.boot();

    assert_eq!(rig.board.restarts, 1);
    assert!(
        rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::StorageFault(_)))
    );
}

#[test]
fn stored_network_reaches_managed_and_subscribes() {
    let rig = Rig::managed();

    assert_eq!(rig.app.mode(), DeviceMode::Managed);
    assert!(rig.sink.contains(&AppEvent::BusConnected));
    assert!(rig.board.calls.contains(&BoardCall::Connect("relay-TEST01".into())));
    assert_eq!(rig.board.subscriptions, vec![COMMAND_TOPIC.to_string()]);
    assert!(!rig.board.portal_active);
}

#[test]
fn unreachable_stored_network_falls_back_after_poll_budget() {
    let mut rig = Rig::new(MemEeprom::provisioned("Elsewhere", HOME_PASS, SECRET));
    rig.boot();
    assert_eq!(rig.app.state(), StateId::TestingStored);

    // 20 polls at 500 ms: the last one lands at 10 s.
    rig.run_for(9_900);
    assert_eq!(rig.app.state(), StateId::TestingStored);
    rig.run_for(200);
    assert_eq!(rig.app.state(), StateId::Provisioning);
    assert!(rig.board.portal_active);
    // The stored network is kept for the next boot.
    assert!(rig.app.store().network().is_some());
}

// ── Relay path ────────────────────────────────────────────────

#[test]
fn accepted_command_is_framed_downstream() {
    let mut rig = Rig::managed();
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);

    let expected = r#"{"ducky_script":"STRING hello"}"#;
    assert_eq!(rig.link().frames(), vec![expected.to_string()]);
    assert!(rig.app.relay().awaiting_ack());
    assert!(rig.sink.contains(&AppEvent::CommandAccepted { queued: false }));
    assert!(rig.sink.contains(&AppEvent::RelayDispatched {
        bytes: expected.len() + 1
    }));
    assert_eq!(rig.app.stats().relayed, 1);
}

#[test]
fn completion_publishes_telemetry() {
    let mut rig = Rig::managed();
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);

    rig.link()
        .reply(r#"PICO_DONE:{"command":"STRING hello","status":"success","execution_time":250}"#);
    rig.tick_after(10);

    assert!(!rig.app.relay().awaiting_ack());
    assert_eq!(rig.board.published.len(), 1);
    let msg = &rig.board.published[0];
    assert_eq!(msg.topic, TELEMETRY_TOPIC);

    let report: TelemetryReport = serde_json::from_slice(&msg.payload).unwrap();
    assert_eq!(report.esp_id, "LDrago_windows");
    assert_eq!(report.command, "STRING hello");
    assert_eq!(report.status, "success");
    assert_eq!(report.execution_time, 250);
    assert_eq!(report.timestamp, rig.now);
    assert_eq!(rig.app.stats().completed, 1);
}

#[test]
fn wrong_secret_is_rejected() {
    let mut rig = Rig::managed();
    rig.send_command("STRING hello", false, "wrong");
    rig.tick_after(10);

    assert!(rig.link().frames().is_empty());
    assert!(rig.sink.contains(&AppEvent::CommandRejected(RejectReason::Auth)));
    assert_eq!(rig.app.stats().rejected_auth, 1);
}

#[test]
fn malformed_payload_is_rejected() {
    let mut rig = Rig::managed();
    assert!(rig.board.deliver(COMMAND_TOPIC, b"not json"));
    rig.tick_after(10);

    assert!(rig.sink.contains(&AppEvent::CommandRejected(RejectReason::Malformed)));
    assert_eq!(rig.app.stats().rejected_malformed, 1);
}

#[test]
fn repeated_script_needs_repeat_flag() {
    let mut rig = Rig::managed();
    for repeat in [false, false, true] {
        rig.send_command("STRING hello", repeat, SECRET);
        rig.tick_after(10);
        rig.link().reply(r#"PICO_DONE:{"command":"STRING hello","status":"ok"}"#);
        rig.tick_after(10);
    }

    assert_eq!(rig.link().frames().len(), 2);
    assert_eq!(rig.app.stats().rejected_duplicate, 1);
    assert!(rig.sink.contains(&AppEvent::CommandRejected(RejectReason::Duplicate)));
}

#[test]
fn busy_relay_keeps_only_the_newest_waiting_command() {
    let mut rig = Rig::managed();
    rig.send_command("STRING first", false, SECRET);
    rig.tick_after(10);

    rig.send_command("STRING second", false, SECRET);
    rig.send_command("STRING third", false, SECRET);
    rig.tick_after(10);

    assert!(rig.sink.contains(&AppEvent::CommandAccepted { queued: true }));
    assert!(rig.sink.contains(&AppEvent::PendingReplaced));
    assert_eq!(rig.app.pending().map(|p| p.script.as_str()), Some("STRING third"));
    assert_eq!(rig.link().frames().len(), 1);

    rig.link().reply(r#"PICO_DONE:{"command":"STRING first","status":"ok"}"#);
    rig.tick_after(10);

    let frames = rig.link().frames();
    assert_eq!(frames.len(), 2);
    assert!(frames[1].contains("STRING third"));
    assert!(rig.app.pending().is_none());
    assert_eq!(rig.app.stats().pending_replaced, 1);
}

#[test]
fn missing_acknowledgment_times_out() {
    let mut rig = Rig::managed();
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);

    rig.run_for(9_990);
    assert!(rig.app.relay().awaiting_ack());
    rig.run_for(20);
    assert!(!rig.app.relay().awaiting_ack());
    assert_eq!(rig.app.stats().timed_out, 1);
    assert!(
        rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::RelayTimedOut { waited_ms } if *waited_ms > 10_000))
    );
}

#[test]
fn late_completion_after_timeout_still_publishes() {
    let mut rig = Rig::managed();
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);
    rig.run_for(10_100);

    rig.link().reply(r#"PICO_DONE:{"command":"STRING hello","status":"late"}"#);
    rig.tick_after(10);

    assert_eq!(rig.board.published.len(), 1);
}

#[test]
fn downstream_error_clears_in_flight_without_telemetry() {
    let mut rig = Rig::managed();
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);

    rig.link().reply("PICO_PROGRESS:typing");
    rig.tick_after(10);
    assert!(rig.app.relay().awaiting_ack());
    assert!(rig.sink.contains(&AppEvent::RelayProgress {
        detail: "typing".into()
    }));

    rig.link().reply("PICO_ERROR:keyboard unavailable");
    rig.tick_after(10);
    assert!(!rig.app.relay().awaiting_ack());
    assert!(rig.sink.contains(&AppEvent::RelayFailed {
        detail: "keyboard unavailable".into()
    }));
    assert!(rig.board.published.is_empty());
}

#[test]
fn unparsable_completion_is_an_error() {
    let mut rig = Rig::managed();
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);

    rig.link().reply("PICO_DONE:{broken");
    rig.tick_after(10);

    assert!(!rig.app.relay().awaiting_ack());
    assert!(rig.board.published.is_empty());
    assert_eq!(rig.app.stats().failed, 1);
}

#[test]
fn serial_write_failure_drops_command() {
    let mut rig = Rig::managed();
    rig.link().fail_writes = true;
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);

    assert!(!rig.app.relay().awaiting_ack());
    assert_eq!(rig.app.stats().failed, 1);
    assert_eq!(rig.app.stats().relayed, 0);
}

#[test]
fn ack_lines_are_batched_per_pass() {
    let mut rig = Rig::managed();
    for i in 0..7 {
        rig.link().reply(&format!("debug line {i}"));
    }
    rig.link().reply("PICO_PROGRESS:last");
    rig.tick_after(10);
    assert!(!rig.sink.contains(&AppEvent::RelayProgress {
        detail: "last".into()
    }));
    rig.tick_after(10);
    assert!(rig.sink.contains(&AppEvent::RelayProgress {
        detail: "last".into()
    }));
}

#[test]
fn updated_secret_gates_commands() {
    let mut rig = Rig::new(MemEeprom::provisioned(HOME_SSID, HOME_PASS, "abcd"));
    rig.boot();
    rig.run_for(1_000);

    rig.send_command("STRING one", false, SECRET);
    rig.tick_after(10);
    assert_eq!(rig.app.stats().rejected_auth, 1);

    rig.send_command("STRING one", false, "abcd");
    rig.tick_after(10);
    assert_eq!(rig.app.stats().accepted, 1);
}

// ── Connectivity ──────────────────────────────────────────────

#[test]
fn link_loss_rejoins_then_falls_back_to_provisioning() {
    let mut rig = Rig::managed();
    let joins_before = rig.board.count(&BoardCall::BeginJoin(HOME_SSID.into()));
    rig.send_command("STRING hello", false, SECRET);
    rig.tick_after(10);

    rig.board.link_down = true;
    rig.run_for(1_000);
    assert_eq!(rig.app.state(), StateId::Connecting);
    assert!(rig.sink.contains(&AppEvent::LinkCheckFailed { failures: 1 }));
    assert!(rig.board.count(&BoardCall::BeginJoin(HOME_SSID.into())) > joins_before);
    // In-flight work survives a reconnect attempt.
    assert!(rig.app.relay().awaiting_ack());

    rig.run_for(4_000);
    assert_eq!(rig.app.state(), StateId::Provisioning);
    assert!(rig.sink.contains(&AppEvent::LinkCheckFailed { failures: 5 }));
    assert!(rig.board.portal_active);
    assert!(!rig.app.relay().awaiting_ack());
}

#[test]
fn link_recovery_returns_to_managed() {
    let mut rig = Rig::managed();
    rig.board.link_down = true;
    rig.run_for(1_000);
    assert_eq!(rig.app.state(), StateId::Connecting);

    rig.board.link_down = false;
    rig.run_for(100);
    assert_eq!(rig.app.state(), StateId::Managed);
    assert_eq!(rig.app.link_failures(), 0);
}

#[test]
fn link_recovers_one_check_before_giving_up() {
    let mut rig = Rig::managed();
    rig.board.link_down = true;
    rig.run_for(3_600);
    assert_eq!(rig.app.state(), StateId::Connecting);
    assert_eq!(rig.app.link_failures(), 4);
    assert!(rig.sink.contains(&AppEvent::LinkCheckFailed { failures: 4 }));

    rig.board.link_down = false;
    rig.run_for(100);
    assert_eq!(rig.app.state(), StateId::Managed);
    assert_eq!(rig.app.link_failures(), 0);

    rig.run_for(2_000);
    assert_eq!(rig.app.state(), StateId::Managed);
    assert!(!rig.sink.contains(&AppEvent::LinkCheckFailed { failures: 5 }));
    assert!(!rig.board.portal_active);
}

#[test]
fn dropped_bus_session_is_retried_and_resubscribed() {
    let mut rig = Rig::managed();
    rig.board.drop_bus();
    rig.run_for(4_400);
    assert!(!rig.board.bus_connected);
    assert_eq!(rig.app.state(), StateId::Managed);

    rig.run_for(200);
    assert!(rig.board.bus_connected);
    assert_eq!(rig.board.subscriptions, vec![COMMAND_TOPIC.to_string()]);
    assert_eq!(rig.board.count(&BoardCall::Subscribe(COMMAND_TOPIC.into())), 2);
}

#[test]
fn broker_outage_keeps_retrying() {
    let mut rig = Rig::managed();
    rig.board.drop_bus();
    rig.board.broker_up = false;
    let attempts_before = rig.board.count(&BoardCall::Connect("relay-TEST01".into()));

    rig.run_for(15_000);
    let attempts = rig.board.count(&BoardCall::Connect("relay-TEST01".into())) - attempts_before;
    assert_eq!(attempts, 3);
    assert_eq!(rig.app.state(), StateId::Managed);
}
