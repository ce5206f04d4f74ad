//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART on the device, stderr on hosts), one tagged line per
//! event so they can be grepped out of a serial capture.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(mode) => info!("MODE  | started in {:?}", mode),
            AppEvent::StateChanged { from, to } => {
                info!("MODE  | {:?} -> {:?} ({:?})", from, to, to.mode());
            }
            AppEvent::BusConnected => info!("LINK  | bus connected"),
            AppEvent::LinkCheckFailed { failures } => {
                warn!("LINK  | station down, consecutive failures={}", failures);
            }
            AppEvent::CommandAccepted { queued } => {
                info!("CMD   | accepted{}", if *queued { " (queued)" } else { "" });
            }
            AppEvent::CommandRejected(reason) => warn!("CMD   | rejected: {}", reason),
            AppEvent::PendingReplaced => warn!("CMD   | queued command replaced"),
            AppEvent::RelayDispatched { bytes } => info!("RELAY | sent {} bytes", bytes),
            AppEvent::RelayCompleted {
                command,
                status,
                elapsed_ms,
            } => info!(
                "RELAY | done command='{}' status='{}' time={}ms",
                command, status, elapsed_ms
            ),
            AppEvent::RelayFailed { detail } => error!("RELAY | failed: {}", detail),
            AppEvent::RelayProgress { detail } => info!("RELAY | progress: {}", detail),
            AppEvent::RelayTimedOut { waited_ms } => {
                warn!("RELAY | no acknowledgment after {}ms", waited_ms);
            }
            AppEvent::StorageFault(e) => error!("MODE  | storage fault: {}", e),
        }
    }
}
