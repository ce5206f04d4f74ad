//! Relay configuration parameters
//!
//! All tunable parameters for the RelayLink controller: bus endpoints,
//! access-point identity, and every timing constant the control loop uses.
//! The defaults match the deployed bridge; the host simulation can
//! override them from a JSON file.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Short bounded string used for hostnames, topics and identities.
pub type Label = heapless::String<64>;

/// Longest authorization secret the credential region can hold.
pub const MAX_SECRET_LEN: usize = 49;

/// Core relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    // --- Message bus ---
    /// MQTT broker hostname
    pub broker_host: Label,
    /// MQTT broker TCP port
    pub broker_port: u16,
    /// Topic carrying inbound commands
    pub command_topic: Label,
    /// Topic receiving completion telemetry
    pub telemetry_topic: Label,
    /// Identity stamped into every telemetry report
    pub device_id: Label,

    // --- Provisioning ---
    /// SSID of the configuration access point
    pub ap_ssid: Label,
    /// WPA2 passphrase of the configuration access point
    pub ap_passphrase: Label,
    /// Control secret restored on erase and used before one is set
    pub factory_secret: Label,
    /// Shortest control secret accepted from the configuration interface
    pub min_secret_len: u8,

    // --- Timing ---
    /// How long a relayed command may await its acknowledgment (ms)
    pub relay_timeout_ms: u64,
    /// Link liveness check period while managed (ms)
    pub link_check_interval_ms: u64,
    /// Consecutive failed checks before falling back to provisioning
    pub link_failure_threshold: u8,
    /// Spacing between join polls (ms)
    pub join_poll_interval_ms: u64,
    /// Join polls allowed before a candidate network is declared unreachable
    pub join_poll_budget: u8,
    /// Downstream lines handled per loop pass
    pub ack_batch_limit: u8,
    /// Spacing between bus reconnect attempts (ms)
    pub bus_retry_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            // Bus
            broker_host: label("broker.emqx.io"),
            broker_port: 1883,
            command_topic: label("LDrago_windows/ducky_script"),
            telemetry_topic: label("LDrago_windows/pico_execution_done"),
            device_id: label("LDrago_windows"),

            // Provisioning
            ap_ssid: label("LaptopControl_Config"),
            ap_passphrase: label("12345678"),
            factory_secret: label("1234"),
            min_secret_len: 4,

            // Timing
            relay_timeout_ms: 10_000,
            link_check_interval_ms: 1_000,
            link_failure_threshold: 5,
            join_poll_interval_ms: 500,
            join_poll_budget: 20,
            ack_batch_limit: 5,
            bus_retry_interval_ms: 5_000,
        }
    }
}

impl RelayConfig {
    /// Parse a JSON override document.  Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_host.is_empty() {
            return Err(ConfigError::ValidationFailed("broker_host must not be empty"));
        }
        if self.command_topic.is_empty() || self.telemetry_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("bus topics must not be empty"));
        }
        if self.command_topic == self.telemetry_topic {
            return Err(ConfigError::ValidationFailed(
                "command_topic and telemetry_topic must differ",
            ));
        }
        if self.ap_ssid.is_empty() || self.ap_ssid.len() > 32 {
            return Err(ConfigError::ValidationFailed("ap_ssid must be 1–32 bytes"));
        }
        if !(8..=63).contains(&self.ap_passphrase.len()) {
            return Err(ConfigError::ValidationFailed("ap_passphrase must be 8–63 bytes"));
        }
        if self.min_secret_len == 0 || usize::from(self.min_secret_len) > MAX_SECRET_LEN {
            return Err(ConfigError::ValidationFailed("min_secret_len must be 1–49"));
        }
        if self.factory_secret.is_empty() || self.factory_secret.len() > MAX_SECRET_LEN {
            return Err(ConfigError::ValidationFailed("factory_secret must be 1–49 bytes"));
        }
        if self.relay_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("relay_timeout_ms must be > 0"));
        }
        if !(100..=60_000).contains(&self.link_check_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "link_check_interval_ms must be 100–60000",
            ));
        }
        if self.link_failure_threshold == 0 {
            return Err(ConfigError::ValidationFailed("link_failure_threshold must be > 0"));
        }
        if self.join_poll_interval_ms == 0 || self.join_poll_budget == 0 {
            return Err(ConfigError::ValidationFailed("join polling must be non-zero"));
        }
        if self.ack_batch_limit == 0 {
            return Err(ConfigError::ValidationFailed("ack_batch_limit must be > 0"));
        }
        Ok(())
    }
}

/// Build a bounded label, truncating anything past capacity.
pub fn label<const N: usize>(text: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The override document is not valid JSON for [`RelayConfig`].
    Malformed,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed config document"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
