//! Inbound commands to the application service.
//!
//! The configuration portal is the only outside actor allowed to change
//! the stored network or the control secret.  Its requests arrive as
//! [`PortalRequest`]s, which the
//! [`RelayController`](super::service::RelayController) interprets while
//! the device is provisioning, and every request is answered with exactly
//! one [`PortalResponse`].

use super::ports::NetworkInfo;

/// Requests the configuration portal can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalRequest {
    /// List nearby networks.
    Scan,

    /// Test a candidate network; persist it and leave provisioning if the
    /// join succeeds.
    Connect { ssid: String, passphrase: String },

    /// Wipe stored credentials and restart.
    EraseCredentials,

    /// Replace the control secret, keeping the stored network.
    SetSecret { secret: String },
}

/// Answer to a [`PortalRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalResponse {
    /// Result of [`PortalRequest::Scan`].
    Networks(Vec<NetworkInfo>),
    /// The request succeeded; the text is shown to the user.
    Success(String),
    /// The request failed; the text is shown to the user.
    Failure(&'static str),
}
