//! Credential store: durable network credentials and the control secret.
//!
//! The credentials live in a fixed 512-byte region of the persistent store:
//!
//! ```text
//!   0        1                  100      101                200   202     300      301       350      512
//!   ┌────────┬──────────────────┬────────┬──────────────────┬─────┬───────┬────────┬─────────┬────────┐
//!   │ssid len│ ssid bytes (≤99) │pass len│ pass bytes (≤99) │0xAB12│ free  │sec len │ secret  │  free  │
//!   └────────┴──────────────────┴────────┴──────────────────┴─────┴───────┴────────┴─────────┴────────┘
//! ```
//!
//! The validity marker guards the network half only.  The secret is read
//! on its own so a device that never saw a network still honours a secret
//! set earlier, and falls back to the factory default otherwise.

use log::{info, warn};

use crate::app::ports::{EepromPort, StorageError, WifiError};
use crate::config::MAX_SECRET_LEN;

// ───────────────────────────────────────────────────────────────
// Layout
// ───────────────────────────────────────────────────────────────

/// Size of the credential region.
pub const REGION_LEN: usize = 512;

const SSID_LEN_ADDR: usize = 0;
const SSID_ADDR: usize = 1;
const PASS_LEN_ADDR: usize = 100;
const PASS_ADDR: usize = 101;
const MARKER_ADDR: usize = 200;
const SECRET_LEN_ADDR: usize = 300;
const SECRET_ADDR: usize = 301;

/// Validity marker, stored big-endian at [`MARKER_ADDR`].
pub const MARKER: u16 = 0xAB12;

/// Network SSID (802.11 limit).
pub type Ssid = heapless::String<32>;
/// WPA2 passphrase.
pub type Passphrase = heapless::String<64>;
/// Control secret checked against every inbound command.
pub type Secret = heapless::String<MAX_SECRET_LEN>;

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

/// A complete set of stored credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: Ssid,
    pub passphrase: Passphrase,
    pub auth_secret: Secret,
}

impl Credentials {
    /// Validate and build a credential set for a candidate network.
    pub fn new(ssid: &str, passphrase: &str, auth_secret: &Secret) -> Result<Self, WifiError> {
        validate_ssid(ssid)?;
        validate_passphrase(passphrase)?;
        Ok(Self {
            ssid: crate::config::label(ssid),
            passphrase: crate::config::label(passphrase),
            auth_secret: auth_secret.clone(),
        })
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// SSIDs must be 1–32 printable ASCII bytes.
pub fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

/// Passphrases are empty (open network) or 8–64 bytes.
pub fn validate_passphrase(passphrase: &str) -> Result<(), WifiError> {
    if passphrase.is_empty() {
        return Ok(());
    }
    if passphrase.len() < 8 || passphrase.len() > 64 {
        return Err(WifiError::InvalidPassphrase);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// CredentialStore
// ───────────────────────────────────────────────────────────────

/// Owner of the credential region.
///
/// Holds the in-memory copy of whatever was last loaded or saved; the rest
/// of the firmware only ever sees clones.
pub struct CredentialStore<S: EepromPort> {
    eeprom: S,
    factory_secret: Secret,
    secret: Secret,
    network: Option<Credentials>,
}

impl<S: EepromPort> CredentialStore<S> {
    pub fn new(eeprom: S, factory_secret: &str) -> Self {
        let factory_secret: Secret = crate::config::label(factory_secret);
        Self {
            eeprom,
            secret: factory_secret.clone(),
            factory_secret,
            network: None,
        }
    }

    /// Restore credentials from the persistent store.
    ///
    /// Returns `None` when the validity marker is absent or the region is
    /// corrupt, which is the normal first-boot signal.  The control secret
    /// is refreshed either way.
    pub fn load(&mut self) -> Option<Credentials> {
        self.secret = match self.read_field(SECRET_LEN_ADDR, SECRET_ADDR, MAX_SECRET_LEN) {
            Ok(Some(secret)) => {
                info!("CredentialStore: control secret loaded");
                secret
            }
            Ok(None) => self.factory_secret.clone(),
            Err(e) => {
                warn!("CredentialStore: secret read failed ({}), using factory default", e);
                self.factory_secret.clone()
            }
        };

        self.network = match self.read_network() {
            Ok(found) => found,
            Err(e) => {
                warn!("CredentialStore: credential read failed ({})", e);
                None
            }
        };

        match &self.network {
            Some(creds) => info!("CredentialStore: stored network '{}'", creds.ssid),
            None => info!("CredentialStore: no stored network"),
        }
        self.network.clone()
    }

    /// Persist a full credential set.
    ///
    /// Order: clear region, SSID, passphrase, secret, marker, commit.  A
    /// failure at any step leaves the marker unwritten.
    pub fn save(&mut self, creds: &Credentials) -> Result<(), StorageError> {
        self.clear_region()?;
        self.write_field(SSID_LEN_ADDR, SSID_ADDR, creds.ssid.as_bytes())?;
        self.write_field(PASS_LEN_ADDR, PASS_ADDR, creds.passphrase.as_bytes())?;
        self.write_field(SECRET_LEN_ADDR, SECRET_ADDR, creds.auth_secret.as_bytes())?;
        self.eeprom.write(MARKER_ADDR, &MARKER.to_be_bytes())?;
        self.eeprom.commit()?;

        info!("CredentialStore: saved network '{}'", creds.ssid);
        self.secret = creds.auth_secret.clone();
        self.network = Some(creds.clone());
        Ok(())
    }

    /// Replace only the control secret.  The stored network is untouched.
    pub fn save_secret_only(&mut self, secret: &str) -> Result<(), StorageError> {
        if secret.is_empty() || secret.len() > MAX_SECRET_LEN {
            return Err(StorageError::ValueTooLong);
        }
        self.write_field(SECRET_LEN_ADDR, SECRET_ADDR, secret.as_bytes())?;
        self.eeprom.commit()?;

        self.secret = crate::config::label(secret);
        if let Some(network) = &mut self.network {
            network.auth_secret = self.secret.clone();
        }
        info!("CredentialStore: control secret updated");
        Ok(())
    }

    /// Wipe the region and fall back to the factory secret.
    pub fn erase(&mut self) -> Result<(), StorageError> {
        self.network = None;
        self.secret = self.factory_secret.clone();
        self.clear_region()?;
        self.eeprom.commit()?;
        info!("CredentialStore: credentials erased");
        Ok(())
    }

    /// The control secret currently in force.
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// The network restored by the last `load` or `save`.
    pub fn network(&self) -> Option<&Credentials> {
        self.network.as_ref()
    }

    /// Direct access to the backing store (tests, diagnostics).
    pub fn eeprom(&self) -> &S {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut S {
        &mut self.eeprom
    }

    // ── Internal ──────────────────────────────────────────────

    fn read_network(&self) -> Result<Option<Credentials>, StorageError> {
        let mut marker = [0u8; 2];
        self.eeprom.read(MARKER_ADDR, &mut marker)?;
        if u16::from_be_bytes(marker) != MARKER {
            return Ok(None);
        }

        let Some(ssid) = self.read_field::<32>(SSID_LEN_ADDR, SSID_ADDR, PASS_LEN_ADDR - SSID_ADDR)?
        else {
            return Ok(None);
        };
        let passphrase = self
            .read_field::<64>(PASS_LEN_ADDR, PASS_ADDR, MARKER_ADDR - PASS_ADDR)?
            .unwrap_or_default();

        Ok(Some(Credentials {
            ssid,
            passphrase,
            auth_secret: self.secret.clone(),
        }))
    }

    /// Read a length-prefixed UTF-8 field.  Zero, over-long or non-UTF-8
    /// contents read as absent.
    fn read_field<const N: usize>(
        &self,
        len_addr: usize,
        data_addr: usize,
        max_len: usize,
    ) -> Result<Option<heapless::String<N>>, StorageError> {
        let mut len = [0u8; 1];
        self.eeprom.read(len_addr, &mut len)?;
        let len = usize::from(len[0]);
        if len == 0 || len > max_len || len > N {
            return Ok(None);
        }

        let mut buf = [0u8; 128];
        let bytes = &mut buf[..len];
        self.eeprom.read(data_addr, bytes)?;
        match core::str::from_utf8(bytes) {
            Ok(text) => Ok(Some(crate::config::label(text))),
            Err(_) => Ok(None),
        }
    }

    fn write_field(&mut self, len_addr: usize, data_addr: usize, data: &[u8]) -> Result<(), StorageError> {
        let len = u8::try_from(data.len()).map_err(|_| StorageError::ValueTooLong)?;
        self.eeprom.write(len_addr, &[len])?;
        self.eeprom.write(data_addr, data)
    }

    fn clear_region(&mut self) -> Result<(), StorageError> {
        if self.eeprom.capacity() < REGION_LEN {
            return Err(StorageError::OutOfBounds);
        }
        self.eeprom.write(0, &[0u8; REGION_LEN])
    }
}
