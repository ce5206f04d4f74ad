//! Integration tests: configuration portal requests while provisioning.

use relaylink::app::commands::{PortalRequest, PortalResponse};
use relaylink::app::events::AppEvent;
use relaylink::fsm::StateId;

use crate::mock_hw::{BoardCall, HOME_PASS, HOME_SSID, MemEeprom, Rig, SECRET};

fn provisioning() -> Rig {
    let mut rig = Rig::new(MemEeprom::blank());
    rig.boot();
    assert_eq!(rig.app.state(), StateId::Provisioning);
    rig
}

fn connect(ssid: &str, passphrase: &str) -> PortalRequest {
    PortalRequest::Connect {
        ssid: ssid.into(),
        passphrase: passphrase.into(),
    }
}

#[test]
fn scan_lists_visible_networks() {
    let mut rig = provisioning();
    rig.board.requests.push_back(PortalRequest::Scan);
    rig.tick_after(10);

    let [PortalResponse::Networks(networks)] = rig.board.responses.as_slice() else {
        panic!("unexpected responses: {:?}", rig.board.responses);
    };
    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0].ssid.as_str(), HOME_SSID);
}

#[test]
fn working_network_is_saved_and_used() {
    let mut rig = provisioning();
    rig.board.requests.push_back(connect(HOME_SSID, HOME_PASS));
    rig.tick_after(10);
    assert!(rig.board.responses.is_empty());

    rig.run_for(500);
    assert_eq!(
        rig.board.responses,
        vec![PortalResponse::Success("Connected! IP: 10.0.0.7".into())]
    );
    assert_eq!(rig.app.state(), StateId::TestingStored);
    assert!(!rig.board.portal_active);
    assert!(rig.board.calls.contains(&BoardCall::StopAccessPoint));

    let stored = rig.app.store().network().cloned().unwrap();
    assert_eq!(stored.ssid.as_str(), HOME_SSID);
    assert_eq!(stored.passphrase.as_str(), HOME_PASS);
    assert_eq!(stored.auth_secret.as_str(), SECRET);

    rig.run_for(600);
    assert_eq!(rig.app.state(), StateId::Managed);
    assert!(rig.sink.contains(&AppEvent::StateChanged {
        from: StateId::Provisioning,
        to: StateId::TestingStored,
    }));
}

#[test]
fn signal_strength_is_read_once_the_candidate_joins() {
    let mut rig = provisioning();
    rig.board.requests.push_back(connect(HOME_SSID, HOME_PASS));
    rig.tick_after(10);
    assert_eq!(rig.board.rssi_reads.get(), 0);

    rig.run_for(500);
    assert_eq!(rig.app.state(), StateId::TestingStored);
    assert_eq!(rig.board.rssi_reads.get(), 1);
}

#[test]
fn unreachable_network_reports_failure_and_stays_provisioning() {
    let mut rig = provisioning();
    rig.board.requests.push_back(connect("Neighbour", "password1"));
    rig.tick_after(10);

    rig.run_for(9_900);
    assert!(rig.board.responses.is_empty());
    rig.run_for(200);

    assert_eq!(
        rig.board.responses,
        vec![PortalResponse::Failure(
            "Failed to connect. Check SSID and password."
        )]
    );
    assert_eq!(rig.app.state(), StateId::Provisioning);
    assert!(rig.board.portal_active);
    assert!(rig.app.store().network().is_none());
    assert!(rig.app.store().eeprom().image.iter().all(|b| *b == 0));
}

#[test]
fn invalid_candidates_are_refused_up_front() {
    let mut rig = provisioning();
    rig.board.requests.push_back(connect("", HOME_PASS));
    rig.board.requests.push_back(connect(HOME_SSID, "short"));
    rig.tick_after(10);
    rig.tick_after(10);

    assert_eq!(
        rig.board.responses,
        vec![
            PortalResponse::Failure("Invalid SSID"),
            PortalResponse::Failure("Invalid password"),
        ]
    );
    assert_eq!(rig.board.count(&BoardCall::BeginJoin(HOME_SSID.into())), 0);
}

#[test]
fn second_connect_while_testing_is_refused() {
    let mut rig = provisioning();
    rig.board.requests.push_back(connect("Neighbour", "password1"));
    rig.board.requests.push_back(connect(HOME_SSID, HOME_PASS));
    rig.tick_after(10);
    rig.tick_after(10);

    assert_eq!(
        rig.board.responses,
        vec![PortalResponse::Failure("Connection test already running")]
    );
    assert_eq!(rig.board.count(&BoardCall::BeginJoin(HOME_SSID.into())), 0);
}

#[test]
fn secret_update_checks_length() {
    let mut rig = provisioning();
    let too_long = "x".repeat(50);
    for secret in ["12", too_long.as_str(), "abcd"] {
        rig.board.requests.push_back(PortalRequest::SetSecret {
            secret: secret.into(),
        });
        rig.tick_after(10);
    }

    assert_eq!(
        rig.board.responses,
        vec![
            PortalResponse::Failure("Password too short"),
            PortalResponse::Failure("Password too long"),
            PortalResponse::Success("Password updated!".into()),
        ]
    );
    assert_eq!(rig.app.store().secret().as_str(), "abcd");
}

#[test]
fn updated_secret_is_carried_into_saved_credentials() {
    let mut rig = provisioning();
    rig.board.requests.push_back(PortalRequest::SetSecret {
        secret: "s3cret".into(),
    });
    rig.tick_after(10);
    rig.board.requests.push_back(connect(HOME_SSID, HOME_PASS));
    rig.tick_after(10);
    rig.run_for(500);

    let stored = rig.app.store().network().cloned().unwrap();
    assert_eq!(stored.auth_secret.as_str(), "s3cret");

    rig.run_for(600);
    rig.send_command("STRING hi", false, "s3cret");
    rig.tick_after(10);
    assert_eq!(rig.app.stats().accepted, 1);
}

#[test]
fn clear_restores_factory_secret_and_restarts() {
    let mut rig = provisioning();
    rig.board.requests.push_back(PortalRequest::SetSecret {
        secret: "abcd".into(),
    });
    rig.board.requests.push_back(PortalRequest::EraseCredentials);
    rig.tick_after(10);
    rig.tick_after(10);

    assert_eq!(
        rig.board.responses.last(),
        Some(&PortalResponse::Success(
            "Credentials cleared! Restarting...".into()
        ))
    );
    assert_eq!(rig.board.restarts, 1);
    assert_eq!(rig.app.store().secret().as_str(), SECRET);
    assert!(rig.app.store().eeprom().image.iter().all(|b| *b == 0));
}

#[test]
fn failed_save_reports_and_restarts() {
    let mut eeprom = MemEeprom::blank();
    eeprom.write_budget = Some(0);
    let mut rig = Rig::new(eeprom);
    rig.boot();

    rig.board.requests.push_back(connect(HOME_SSID, HOME_PASS));
    rig.tick_after(10);
    rig.run_for(500);

    assert_eq!(
        rig.board.responses,
        vec![PortalResponse::Failure("Could not save credentials")]
    );
    assert_eq!(rig.board.restarts, 1);
    assert!(
        rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::StorageFault(_)))
    );
}

#[test]
fn requests_are_ignored_outside_provisioning() {
    let mut rig = Rig::managed();
    rig.board.requests.push_back(PortalRequest::EraseCredentials);
    rig.run_for(100);

    assert!(rig.board.responses.is_empty());
    assert_eq!(rig.board.restarts, 0);
    assert!(rig.app.store().network().is_some());
}
