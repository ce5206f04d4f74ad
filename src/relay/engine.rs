//! Relay protocol engine.
//!
//! Owns the serial transport, frames accepted commands for the downstream
//! unit, and tracks the single in-flight request until its acknowledgment
//! arrives or the timeout lapses.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::codec::{LineDecoder, encode_line};
use super::transport::Transport;
use crate::app::ports::LinkError;

/// Prefix of a completion report.
pub const DONE_PREFIX: &str = "PICO_DONE:";
/// Prefix of an error report.
pub const ERROR_PREFIX: &str = "PICO_ERROR:";
/// Prefix of a progress report.
pub const PROGRESS_PREFIX: &str = "PICO_PROGRESS:";

/// Bytes pulled from the transport per read.
const RX_CHUNK: usize = 64;

// ───────────────────────────────────────────────────────────────
// Wire types
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CommandFrame<'a> {
    ducky_script: &'a str,
}

/// Body of a `PICO_DONE:` line.  Absent fields read as empty / zero.
#[derive(Deserialize)]
struct CompletionReport {
    #[serde(default)]
    command: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    execution_time: u64,
}

/// Completion telemetry published to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub esp_id: String,
    pub command: String,
    pub status: String,
    pub execution_time: u64,
    pub timestamp: u64,
}

// ───────────────────────────────────────────────────────────────
// Outcomes
// ───────────────────────────────────────────────────────────────

/// One classified downstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The command finished.  Clears the in-flight request.
    Done {
        command: String,
        status: String,
        elapsed_ms: u64,
    },
    /// The command failed, or its completion report was unreadable.
    /// Clears the in-flight request.
    Error { detail: String },
    /// Intermediate progress.  The request stays in flight.
    Progress { detail: String },
    /// A line with no recognised prefix (debug chatter).
    Other { line: String },
}

/// The request currently awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub payload: String,
    pub sent_at: u64,
}

// ───────────────────────────────────────────────────────────────
// RelayEngine
// ───────────────────────────────────────────────────────────────

pub struct RelayEngine<T: Transport> {
    transport: T,
    decoder: LineDecoder,
    rx_buf: [u8; RX_CHUNK],
    rx_pos: usize,
    rx_len: usize,
    in_flight: Option<InFlight>,
    timeout_ms: u64,
}

impl<T: Transport> RelayEngine<T> {
    pub fn new(transport: T, timeout_ms: u64) -> Self {
        Self {
            transport,
            decoder: LineDecoder::new(),
            rx_buf: [0; RX_CHUNK],
            rx_pos: 0,
            rx_len: 0,
            in_flight: None,
            timeout_ms,
        }
    }

    /// Frame `script` and write it downstream.
    ///
    /// On success the request is in flight from `now_ms`.  A failed write
    /// leaves the engine idle.
    pub fn send(&mut self, script: &str, now_ms: u64) -> Result<usize, LinkError> {
        let json = serde_json::to_string(&CommandFrame { ducky_script: script })
            .map_err(|_| LinkError::EncodeFailed)?;
        let frame = encode_line(&json);

        let written = self.transport.write(frame.as_bytes()).map_err(|e| {
            error!("Relay: serial write failed: {:?}", e);
            LinkError::WriteFailed
        })?;
        if written != frame.len() {
            warn!("Relay: short write ({} of {} bytes)", written, frame.len());
            return Err(LinkError::ShortWrite);
        }
        self.transport.flush().map_err(|e| {
            error!("Relay: serial flush failed: {:?}", e);
            LinkError::WriteFailed
        })?;

        info!("Relay: dispatched {} byte frame", frame.len());
        self.in_flight = Some(InFlight {
            payload: json,
            sent_at: now_ms,
        });
        Ok(frame.len())
    }

    /// Read and classify the next complete downstream line.
    ///
    /// Returns `Ok(None)` when no complete line is buffered yet.  Blank
    /// lines are skipped.
    pub fn poll_response(&mut self) -> Result<Option<RelayOutcome>, LinkError> {
        loop {
            if self.rx_pos == self.rx_len {
                let n = self.transport.read(&mut self.rx_buf).map_err(|e| {
                    warn!("Relay: serial read failed: {:?}", e);
                    LinkError::ReadFailed
                })?;
                if n == 0 {
                    return Ok(None);
                }
                self.rx_pos = 0;
                self.rx_len = n;
            }

            let byte = self.rx_buf[self.rx_pos];
            self.rx_pos += 1;

            let Some(raw) = self.decoder.feed(byte) else {
                continue;
            };
            let outcome = {
                let text = String::from_utf8_lossy(raw);
                let line = text.trim();
                if line.is_empty() {
                    continue;
                }
                classify(line)
            };
            self.settle(&outcome);
            return Ok(Some(outcome));
        }
    }

    /// Clear the in-flight request once it has waited longer than the
    /// timeout.  Returns the time waited when that happens.
    pub fn check_timeout(&mut self, now_ms: u64) -> Option<u64> {
        let waited = now_ms.saturating_sub(self.in_flight.as_ref()?.sent_at);
        if waited > self.timeout_ms {
            warn!("Relay: no acknowledgment after {} ms, assuming done", waited);
            self.in_flight = None;
            return Some(waited);
        }
        None
    }

    /// Drop the in-flight request and any partial input.
    pub fn discard(&mut self) {
        if self.in_flight.take().is_some() {
            info!("Relay: in-flight request discarded");
        }
        self.decoder.reset();
        self.rx_pos = 0;
        self.rx_len = 0;
    }

    pub fn awaiting_ack(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn settle(&mut self, outcome: &RelayOutcome) {
        match outcome {
            RelayOutcome::Done { .. } | RelayOutcome::Error { .. } => {
                if self.in_flight.take().is_none() {
                    debug!("Relay: acknowledgment with nothing in flight");
                }
            }
            RelayOutcome::Progress { .. } | RelayOutcome::Other { .. } => {}
        }
    }
}

/// Map one trimmed line onto its outcome.
pub fn classify(line: &str) -> RelayOutcome {
    if let Some(body) = line.strip_prefix(DONE_PREFIX) {
        return match serde_json::from_str::<CompletionReport>(body) {
            Ok(report) => RelayOutcome::Done {
                command: report.command,
                status: report.status,
                elapsed_ms: report.execution_time,
            },
            Err(e) => RelayOutcome::Error {
                detail: format!("unparsable completion report: {e}"),
            },
        };
    }
    if let Some(detail) = line.strip_prefix(ERROR_PREFIX) {
        return RelayOutcome::Error {
            detail: detail.to_string(),
        };
    }
    if let Some(detail) = line.strip_prefix(PROGRESS_PREFIX) {
        return RelayOutcome::Progress {
            detail: detail.to_string(),
        };
    }
    RelayOutcome::Other {
        line: line.to_string(),
    }
}
