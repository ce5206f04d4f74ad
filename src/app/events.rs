//! Outbound application events.
//!
//! The [`RelayController`](super::service::RelayController) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them (log to serial, count them
//! in a test, etc.).

use crate::app::ports::StorageError;
use crate::fsm::{DeviceMode, StateId};
use crate::gateway::RejectReason;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The controller has booted (carries the first decided mode).
    Started(DeviceMode),

    /// The provisioning state machine moved between states.
    StateChanged { from: StateId, to: StateId },

    /// The bus session came up.
    BusConnected,

    /// An inbound command passed authentication and dedup.
    CommandAccepted {
        /// `true` when it had to wait behind an in-flight request.
        queued: bool,
    },

    /// An inbound command was dropped.
    CommandRejected(RejectReason),

    /// A waiting command was overwritten by a newer accepted one.
    PendingReplaced,

    /// A command frame was written to the downstream unit.
    RelayDispatched { bytes: usize },

    /// The downstream unit reported completion.
    RelayCompleted {
        command: String,
        status: String,
        elapsed_ms: u64,
    },

    /// The downstream unit reported an error, or its completion report
    /// could not be parsed.
    RelayFailed { detail: String },

    /// The downstream unit reported progress.
    RelayProgress { detail: String },

    /// No acknowledgment arrived within the relay timeout.
    RelayTimedOut { waited_ms: u64 },

    /// A periodic link check found the station disconnected.
    LinkCheckFailed { failures: u8 },

    /// Writing the credential region failed; the device restarts.
    StorageFault(StorageError),
}
