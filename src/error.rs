//! Unified error types for the RelayLink firmware.
//!
//! Each port reports its own small, `Copy` error enum; every one of them
//! converts into the top-level [`Error`] so the boot path and the binary
//! entry point can handle failures uniformly.

use core::fmt;

pub use crate::app::ports::{BusError, LinkError, StorageError, WifiError};
pub use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The persistent credential region could not be read or written.
    Storage(StorageError),
    /// The serial link to the downstream unit failed.
    Link(LinkError),
    /// The WiFi radio rejected a request.
    Wifi(WifiError),
    /// The message-bus session failed.
    Bus(BusError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Link(e) => write!(f, "serial link: {e}"),
            Self::Wifi(e) => write!(f, "wifi: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<WifiError> for Error {
    fn from(e: WifiError) -> Self {
        Self::Wifi(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
