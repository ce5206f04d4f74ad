//! WiFi radio adapter.
//!
//! Implements [`WifiPort`]: station joins for the managed mode and the
//! configuration access point for provisioning.  Both can be up at once
//! so a candidate network can be tested while the portal stays reachable.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: a simulated radio with a fixed list of
//!   reachable networks, for host-side runs and tests.

use std::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{NetworkInfo, WifiError, WifiPort};
use crate::store::{validate_passphrase, validate_ssid};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

// ───────────────────────────────────────────────────────────────
// Device backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiAdapter {
    wifi: EspWifi<'static>,
    client: ClientConfiguration,
    access_point: Option<AccessPointConfiguration>,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            wifi,
            client: ClientConfiguration::default(),
            access_point: None,
        }
    }

    /// Push the current station / AP pair to the driver and (re)start it.
    fn apply(&mut self) -> Result<(), WifiError> {
        let config = match &self.access_point {
            Some(ap) => Configuration::Mixed(self.client.clone(), ap.clone()),
            None => Configuration::Client(self.client.clone()),
        };
        self.wifi.set_configuration(&config).map_err(|e| {
            warn!("WiFi: set_configuration failed: {}", e);
            WifiError::JoinFailed
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                warn!("WiFi: start failed: {}", e);
                WifiError::JoinFailed
            })?;
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl WifiPort for WifiAdapter {
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_passphrase(passphrase)?;

        self.client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: passphrase
                .try_into()
                .map_err(|_| WifiError::InvalidPassphrase)?,
            auth_method: if passphrase.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        self.apply()?;
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect failed: {}", e);
            WifiError::JoinFailed
        })?;
        info!("WiFi: joining '{}'", ssid);
        Ok(())
    }

    fn is_joined(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
    }

    fn start_access_point(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        self.access_point = Some(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::AccessPointFailed)?,
            password: passphrase
                .try_into()
                .map_err(|_| WifiError::AccessPointFailed)?,
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        });
        self.apply().map_err(|_| WifiError::AccessPointFailed)?;
        info!("WiFi: access point '{}' up", ssid);
        Ok(())
    }

    fn stop_access_point(&mut self) {
        if self.access_point.take().is_some() {
            if let Err(e) = self.apply() {
                warn!("WiFi: access point teardown failed: {}", e);
            }
            info!("WiFi: access point down");
        }
    }

    fn scan(&mut self) -> Result<Vec<NetworkInfo>, WifiError> {
        let found = self.wifi.scan().map_err(|e| {
            warn!("WiFi: scan failed: {}", e);
            WifiError::ScanFailed
        })?;
        Ok(found
            .into_iter()
            .map(|ap| NetworkInfo {
                ssid: crate::config::label(ap.ssid.as_str()),
                rssi: ap.signal_strength,
            })
            .collect())
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        if !self.is_joined() {
            return None;
        }
        self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }

    fn rssi(&self) -> Option<i8> {
        if !self.is_joined() {
            return None;
        }
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: the station is associated and ap_info is a valid out-pointer.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// A network the simulated radio can reach.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct SimNetwork {
    pub ssid: String,
    pub passphrase: String,
    pub rssi: i8,
}

#[cfg(not(target_os = "espidf"))]
pub struct WifiAdapter {
    networks: Vec<SimNetwork>,
    joined: Option<usize>,
    access_point: Option<String>,
    /// Simulated outage: the station stays configured but never associates.
    link_down: bool,
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new(networks: Vec<SimNetwork>) -> Self {
        Self {
            networks,
            joined: None,
            access_point: None,
            link_down: false,
        }
    }

    /// Simulate losing (or regaining) the upstream network.
    pub fn set_link_down(&mut self, down: bool) {
        self.link_down = down;
    }

    pub fn access_point(&self) -> Option<&str> {
        self.access_point.as_deref()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiPort for WifiAdapter {
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_passphrase(passphrase)?;

        self.joined = self
            .networks
            .iter()
            .position(|n| n.ssid == ssid && n.passphrase == passphrase);
        if self.joined.is_none() {
            warn!("WiFi(sim): '{}' unreachable with the given passphrase", ssid);
        }
        info!("WiFi(sim): joining '{}'", ssid);
        Ok(())
    }

    fn is_joined(&self) -> bool {
        self.joined.is_some() && !self.link_down
    }

    fn disconnect(&mut self) {
        if self.joined.take().is_some() {
            info!("WiFi(sim): disconnected");
        }
    }

    fn start_access_point(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        if ssid.is_empty() || (!passphrase.is_empty() && passphrase.len() < 8) {
            return Err(WifiError::AccessPointFailed);
        }
        info!("WiFi(sim): access point '{}' up", ssid);
        self.access_point = Some(ssid.to_string());
        Ok(())
    }

    fn stop_access_point(&mut self) {
        if self.access_point.take().is_some() {
            info!("WiFi(sim): access point down");
        }
    }

    fn scan(&mut self) -> Result<Vec<NetworkInfo>, WifiError> {
        Ok(self
            .networks
            .iter()
            .map(|n| NetworkInfo {
                ssid: crate::config::label(&n.ssid),
                rssi: n.rssi,
            })
            .collect())
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.is_joined().then_some(Ipv4Addr::new(192, 168, 1, 50))
    }

    fn rssi(&self) -> Option<i8> {
        if !self.is_joined() {
            return None;
        }
        self.joined.map(|i| self.networks[i].rssi)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
