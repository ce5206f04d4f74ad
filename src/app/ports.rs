//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RelayController (domain)
//! ```
//!
//! Driven adapters (persistent store, WiFi radio, message bus, configuration
//! portal, system control, event sinks) implement these traits.  The
//! [`RelayController`](super::service::RelayController) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! ## Security notes
//!
//! - The control secret is stored in plaintext; [`EepromPort`]
//!   implementations sit on the device's private flash.
//! - All port errors are typed; callers must handle every variant explicitly.

use core::fmt;
use std::net::Ipv4Addr;

use super::commands::{PortalRequest, PortalResponse};

// ───────────────────────────────────────────────────────────────
// Persistent store port (driven adapter: domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable persistent store with an explicit commit step.
///
/// Writes land in a working image; only [`commit`](EepromPort::commit)
/// makes them durable.  A power loss between writes and commit leaves the
/// previously committed image intact.
pub trait EepromPort {
    /// Total addressable bytes.
    fn capacity(&self) -> usize;

    /// Fill `buf` with the bytes starting at `addr`.
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Overwrite the bytes starting at `addr` with `data`.
    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Flush the working image to durable storage.
    fn commit(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// WiFi port (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// One entry of a network scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ssid: heapless::String<32>,
    /// Signal strength in dBm.
    pub rssi: i8,
}

/// Station and access-point control of the WiFi radio.
///
/// Every call returns immediately; join progress is observed by polling
/// [`is_joined`](WifiPort::is_joined).
pub trait WifiPort {
    /// Start joining `ssid` as a station.  Does not wait for association.
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError>;

    /// Whether the station is associated and holds an IP address.
    fn is_joined(&self) -> bool;

    /// Drop the station association.
    fn disconnect(&mut self);

    /// Bring up the local configuration access point.
    fn start_access_point(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError>;

    /// Tear down the configuration access point.
    fn stop_access_point(&mut self);

    /// Scan for nearby networks.
    fn scan(&mut self) -> Result<Vec<NetworkInfo>, WifiError>;

    /// Station IP address, if joined.
    fn local_ip(&self) -> Option<Ipv4Addr>;

    /// Signal strength of the joined network in dBm.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Message bus port (driven adapter: domain ↔ MQTT)
// ───────────────────────────────────────────────────────────────

/// A message delivered from a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe session with the remote broker.
pub trait BusPort {
    /// Open a session using `client_id`.
    fn connect(&mut self, client_id: &str) -> Result<(), BusError>;

    /// Whether the session is currently up.
    fn is_connected(&self) -> bool;

    /// Subscribe to `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    /// Publish `payload` to `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Take the next delivered message, if any.  Never blocks.
    fn poll(&mut self) -> Option<BusMessage>;
}

// ───────────────────────────────────────────────────────────────
// Configuration portal port (driving adapter: user → domain)
// ───────────────────────────────────────────────────────────────

/// The request/response boundary of the configuration interface served
/// while the device runs its own access point.
pub trait PortalPort {
    /// Start accepting configuration requests.
    fn start(&mut self);

    /// Stop accepting configuration requests.
    fn stop(&mut self);

    /// Whether the portal is serving.
    fn is_active(&self) -> bool;

    /// Take the next pending request, if any.  Never blocks.
    fn take_request(&mut self) -> Option<PortalRequest>;

    /// Answer the most recently taken request.
    fn respond(&mut self, response: PortalResponse);
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain → chip control)
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Whether the hardware reset trigger is asserted.  Sampled once at boot.
    fn reset_requested(&mut self) -> bool;

    /// Restart the device.  On hardware this does not return.
    fn restart(&mut self);
}

/// Every outward-facing port the controller drives on each pass.
///
/// Bundled so one board adapter can satisfy them all without a double
/// mutable borrow at the call site.
pub trait DevicePorts: WifiPort + BusPort + PortalPort + SystemPort {}

impl<T: WifiPort + BusPort + PortalPort + SystemPort> DevicePorts for T {}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`EepromPort`] operations and the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Address range falls outside the store.
    OutOfBounds,
    /// A value does not fit its region of the layout.
    ValueTooLong,
    /// Generic read error from the backend.
    ReadFailed,
    /// Generic write error from the backend.
    WriteFailed,
    /// The commit to durable storage failed.
    CommitFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "address out of bounds"),
            Self::ValueTooLong => write!(f, "value too long for region"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::CommitFailed => write!(f, "commit failed"),
        }
    }
}

/// Errors from [`WifiPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    InvalidSsid,
    InvalidPassphrase,
    JoinFailed,
    AccessPointFailed,
    ScanFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassphrase => {
                write!(f, "passphrase invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::JoinFailed => write!(f, "station join failed"),
            Self::AccessPointFailed => write!(f, "access point start failed"),
            Self::ScanFailed => write!(f, "network scan failed"),
        }
    }
}

/// Errors from [`BusPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    ConnectFailed,
    NotConnected,
    SubscribeFailed,
    PublishFailed,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
        }
    }
}

/// Errors from the downstream serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    ReadFailed,
    WriteFailed,
    /// The transport accepted fewer bytes than the frame length.
    ShortWrite,
    /// The command could not be encoded as a frame.
    EncodeFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::ShortWrite => write!(f, "short write"),
            Self::EncodeFailed => write!(f, "frame encode failed"),
        }
    }
}
