//! Integration tests: credential store over the simulated EEPROM adapter.

use relaylink::adapters::eeprom::EepromAdapter;
use relaylink::app::ports::{EepromPort, StorageError};
use relaylink::store::{CredentialStore, Credentials, MARKER};

use crate::mock_hw::{HOME_PASS, HOME_SSID, MemEeprom, SECRET};

fn store() -> CredentialStore<EepromAdapter> {
    CredentialStore::new(EepromAdapter::new().unwrap(), SECRET)
}

fn creds(ssid: &str, pass: &str, secret: &str) -> Credentials {
    Credentials::new(ssid, pass, &relaylink::config::label(secret)).unwrap()
}

#[test]
fn saved_network_survives_power_cycle() {
    let mut s = store();
    s.save(&creds(HOME_SSID, HOME_PASS, "s3cret")).unwrap();

    s.eeprom_mut().power_cycle();
    let loaded = s.load().unwrap();
    assert_eq!(loaded.ssid.as_str(), HOME_SSID);
    assert_eq!(loaded.passphrase.as_str(), HOME_PASS);
    assert_eq!(s.secret().as_str(), "s3cret");
    assert_eq!(&s.eeprom().committed()[200..202], &MARKER.to_be_bytes());
}

#[test]
fn failed_commit_keeps_previous_network() {
    let mut s = store();
    s.save(&creds(HOME_SSID, HOME_PASS, SECRET)).unwrap();

    s.eeprom_mut().set_fail_commit(true);
    let err = s.save(&creds("Other", "password2", SECRET)).unwrap_err();
    assert_eq!(err, StorageError::CommitFailed);

    s.eeprom_mut().power_cycle();
    assert_eq!(s.load().unwrap().ssid.as_str(), HOME_SSID);
}

#[test]
fn secret_without_network_is_honoured_after_restart() {
    let mut s = store();
    s.save_secret_only("abcd").unwrap();

    s.eeprom_mut().power_cycle();
    assert_eq!(s.load(), None);
    assert_eq!(s.secret().as_str(), "abcd");
}

#[test]
fn secret_update_keeps_network() {
    let mut s = store();
    s.save(&creds(HOME_SSID, HOME_PASS, SECRET)).unwrap();
    s.save_secret_only("newer").unwrap();

    s.eeprom_mut().power_cycle();
    let loaded = s.load().unwrap();
    assert_eq!(loaded.ssid.as_str(), HOME_SSID);
    assert_eq!(loaded.auth_secret.as_str(), "newer");
}

#[test]
fn damaged_marker_reads_as_unprovisioned() {
    let mut s = store();
    s.save(&creds(HOME_SSID, HOME_PASS, "s3cret")).unwrap();
    s.eeprom_mut().write(200, &[0xAB, 0x13]).unwrap();

    assert_eq!(s.load(), None);
    // The secret is stored outside the marked half.
    assert_eq!(s.secret().as_str(), "s3cret");
}

#[test]
fn erase_is_durable() {
    let mut s = store();
    s.save(&creds(HOME_SSID, HOME_PASS, "s3cret")).unwrap();
    s.erase().unwrap();

    s.eeprom_mut().power_cycle();
    assert_eq!(s.load(), None);
    assert_eq!(s.secret().as_str(), SECRET);
    assert!(s.eeprom().committed().iter().all(|b| *b == 0));
}

#[test]
fn open_network_round_trips() {
    let mut s = store();
    s.save(&creds("CafeWifi", "", SECRET)).unwrap();

    s.eeprom_mut().power_cycle();
    let loaded = s.load().unwrap();
    assert_eq!(loaded.ssid.as_str(), "CafeWifi");
    assert!(loaded.passphrase.is_empty());
}

#[test]
fn save_cut_off_after_passphrase_reads_as_unprovisioned() {
    let mut eeprom = MemEeprom::blank();
    // Clear, then length and bytes for SSID and passphrase.
    eeprom.write_budget = Some(5);
    let mut s = CredentialStore::new(eeprom, SECRET);

    let err = s.save(&creds(HOME_SSID, HOME_PASS, SECRET)).unwrap_err();
    assert_eq!(err, StorageError::WriteFailed);

    let mut reopened = CredentialStore::new(s.eeprom().clone(), SECRET);
    assert!(reopened.load().is_none());
    assert_eq!(reopened.secret().as_str(), SECRET);
}

#[test]
fn interrupted_resave_does_not_resurrect_old_network() {
    let mut eeprom = MemEeprom::provisioned(HOME_SSID, HOME_PASS, "s3cret");
    eeprom.write_budget = Some(5);
    let mut s = CredentialStore::new(eeprom, SECRET);
    assert_eq!(s.load().unwrap().ssid.as_str(), HOME_SSID);

    let err = s.save(&creds("Other", "password2", "s3cret")).unwrap_err();
    assert_eq!(err, StorageError::WriteFailed);

    let mut reopened = CredentialStore::new(s.eeprom().clone(), SECRET);
    assert!(reopened.load().is_none());
}
