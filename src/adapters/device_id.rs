//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable bus client id of the form `relay-XXYYZZ` (last
//! 3 bytes of the 6-byte MAC in uppercase hex), so two bridges on the same
//! public broker never collide.

use core::fmt::Write;

/// Bus client id: "relay-XXYYZZ".
pub type ClientIdString = heapless::String<32>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the bus client id from the last 3 MAC bytes.
pub fn bus_client_id(mac: &MacAddress) -> Result<ClientIdString, core::fmt::Error> {
    let mut id = ClientIdString::new();
    write!(id, "relay-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5])?;
    Ok(id)
}
