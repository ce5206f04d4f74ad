//! Board adapter: bundles the outward-facing adapters behind the port
//! traits the controller drives each pass.
//!
//! The controller takes a single `&mut impl DevicePorts`, so the radio,
//! the bus, the portal and system control live together here.  On hosts
//! each field is its simulation backend and stays reachable for scripting.

use std::net::Ipv4Addr;

use crate::adapters::mqtt::MqttAdapter;
use crate::adapters::portal::PortalAdapter;
use crate::adapters::system::SystemAdapter;
use crate::adapters::wifi::WifiAdapter;
use crate::app::commands::{PortalRequest, PortalResponse};
use crate::app::ports::{
    BusError, BusMessage, BusPort, NetworkInfo, PortalPort, SystemPort, WifiError, WifiPort,
};

/// Concrete adapter that combines every device-facing port.
pub struct Board {
    pub wifi: WifiAdapter,
    pub bus: MqttAdapter,
    pub portal: PortalAdapter,
    pub system: SystemAdapter,
}

impl Board {
    pub fn new(
        wifi: WifiAdapter,
        bus: MqttAdapter,
        portal: PortalAdapter,
        system: SystemAdapter,
    ) -> Self {
        Self {
            wifi,
            bus,
            portal,
            system,
        }
    }
}

// ── WifiPort ──────────────────────────────────────────────────

impl WifiPort for Board {
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        self.wifi.begin_join(ssid, passphrase)
    }

    fn is_joined(&self) -> bool {
        self.wifi.is_joined()
    }

    fn disconnect(&mut self) {
        self.wifi.disconnect();
    }

    fn start_access_point(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        self.wifi.start_access_point(ssid, passphrase)
    }

    fn stop_access_point(&mut self) {
        self.wifi.stop_access_point();
    }

    fn scan(&mut self) -> Result<Vec<NetworkInfo>, WifiError> {
        self.wifi.scan()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi.local_ip()
    }

    fn rssi(&self) -> Option<i8> {
        self.wifi.rssi()
    }
}

// ── BusPort ───────────────────────────────────────────────────

impl BusPort for Board {
    fn connect(&mut self, client_id: &str) -> Result<(), BusError> {
        self.bus.connect(client_id)
    }

    fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.bus.subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        self.bus.publish(topic, payload)
    }

    fn poll(&mut self) -> Option<BusMessage> {
        self.bus.poll()
    }
}

// ── PortalPort ────────────────────────────────────────────────

impl PortalPort for Board {
    fn start(&mut self) {
        self.portal.start();
    }

    fn stop(&mut self) {
        self.portal.stop();
    }

    fn is_active(&self) -> bool {
        self.portal.is_active()
    }

    fn take_request(&mut self) -> Option<PortalRequest> {
        self.portal.take_request()
    }

    fn respond(&mut self, response: PortalResponse) {
        self.portal.respond(response);
    }
}

// ── SystemPort ────────────────────────────────────────────────

impl SystemPort for Board {
    fn reset_requested(&mut self) -> bool {
        self.system.reset_requested()
    }

    fn restart(&mut self) {
        self.system.restart();
    }
}
