//! Command gateway: authentication and duplicate suppression for inbound
//! bus commands.
//!
//! Every message runs the same fixed pipeline:
//!
//! ```text
//!   payload ──▶ parse ──▶ authenticate ──▶ dedup ──▶ Accepted
//!                 │            │              │
//!                 ▼            ▼              ▼
//!             Malformed    RejectedAuth   RejectedDuplicate
//! ```
//!
//! A stage that rejects leaves all gateway state untouched, so an
//! unauthenticated message can never lock or unlock a script.

use core::fmt;

use log::{info, warn};
use serde::{Deserialize, Deserializer};
use subtle::ConstantTimeEq;

/// Wire shape of an inbound command.  Unknown fields are ignored; a
/// `repeat` or `password` of the wrong type reads as its default.
#[derive(Debug, Deserialize)]
struct InboundCommand {
    script: String,
    #[serde(default, deserialize_with = "bool_or_default")]
    repeat: bool,
    #[serde(default, deserialize_with = "string_or_default")]
    password: String,
}

fn bool_or_default<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(serde_json::Value::deserialize(de)?.as_bool().unwrap_or_default())
}

fn string_or_default<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}

/// An accepted command waiting to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub script: String,
    pub allow_repeat: bool,
    pub received_at: u64,
}

/// Result of [`CommandGateway::handle_inbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Accepted(PendingCommand),
    RejectedAuth,
    RejectedDuplicate,
    RejectedMalformed,
}

/// Why a command was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Auth,
    Duplicate,
    Malformed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "authentication failed"),
            Self::Duplicate => write!(f, "duplicate script"),
            Self::Malformed => write!(f, "malformed message"),
        }
    }
}

impl GatewayOutcome {
    /// The rejection reason, or `None` when accepted.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted(_) => None,
            Self::RejectedAuth => Some(RejectReason::Auth),
            Self::RejectedDuplicate => Some(RejectReason::Duplicate),
            Self::RejectedMalformed => Some(RejectReason::Malformed),
        }
    }
}

/// The last accepted script.  There is no time-based expiry: with repeats
/// disallowed, the same script stays locked until a different one is
/// accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupWindow {
    pub last_script: Option<String>,
    pub last_script_at: u64,
}

#[derive(Debug, Default)]
pub struct CommandGateway {
    window: DedupWindow,
}

impl CommandGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one inbound payload through parse → auth → dedup.
    pub fn handle_inbound(&mut self, payload: &[u8], secret: &str, now_ms: u64) -> GatewayOutcome {
        let cmd: InboundCommand = match serde_json::from_slice(payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("Gateway: malformed command ({})", e);
                return GatewayOutcome::RejectedMalformed;
            }
        };
        if cmd.script.is_empty() {
            warn!("Gateway: command without script");
            return GatewayOutcome::RejectedMalformed;
        }

        if !secrets_match(&cmd.password, secret) {
            warn!("Gateway: authentication failed");
            return GatewayOutcome::RejectedAuth;
        }

        if !cmd.repeat && self.window.last_script.as_deref() == Some(cmd.script.as_str()) {
            info!("Gateway: duplicate script ignored");
            return GatewayOutcome::RejectedDuplicate;
        }

        self.window = DedupWindow {
            last_script: Some(cmd.script.clone()),
            last_script_at: now_ms,
        };
        info!(
            "Gateway: accepted {} byte script (repeat={})",
            cmd.script.len(),
            cmd.repeat
        );
        GatewayOutcome::Accepted(PendingCommand {
            script: cmd.script,
            allow_repeat: cmd.repeat,
            received_at: now_ms,
        })
    }

    pub fn window(&self) -> &DedupWindow {
        &self.window
    }
}

/// Byte-exact comparison that does not leak the matching prefix length.
fn secrets_match(candidate: &str, secret: &str) -> bool {
    candidate.as_bytes().ct_eq(secret.as_bytes()).into()
}
