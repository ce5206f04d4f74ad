//! GPIO / peripheral pin assignments for the RelayLink bridge board.
//!
//! Single source of truth: every adapter references this module rather
//! than hard-coding pin numbers.

/// Digital input: configuration reset trigger (active LOW, pulled up).
/// Sampled once at boot.
pub const RESET_TRIGGER_GPIO: i32 = 0;

/// UART TX towards the downstream unit.
pub const LINK_TX_GPIO: i32 = 1;
/// UART RX from the downstream unit.
pub const LINK_RX_GPIO: i32 = 3;
