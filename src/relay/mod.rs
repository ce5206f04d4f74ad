//! Downstream relay: newline-delimited JSON over the serial link.
//!
//! ```text
//! ┌──────────────┐  {"ducky_script": ...}\n   ┌──────────────────┐
//! │ RelayEngine  │ ─────────────────────────▶ │ downstream unit  │
//! │ (one request │ ◀───────────────────────── │                  │
//! │  in flight)  │  PICO_DONE:/ERROR:/PROGRESS│                  │
//! └──────────────┘                            └──────────────────┘
//! ```
//!
//! The engine is generic over [`transport::Transport`], so the UART
//! adapter and the in-memory test double share one code path.

pub mod codec;
pub mod engine;
pub mod transport;

pub use engine::{RelayEngine, RelayOutcome, TelemetryReport};
