//! Interval timers for the cooperative control loop.
//!
//! Nothing in the firmware blocks.  Periodic work (link checks, join
//! polls, bus reconnects) asks an [`Interval`] whether it is due on the
//! current pass and otherwise simply tries again on the next one.
//!
//! ```text
//!   pass ──▶ Interval::due(now)? ──yes──▶ run work, re-arm at `now`
//!                   │
//!                   no ──▶ skip until next pass
//! ```

// ═══════════════════════════════════════════════════════════════
//  Interval
// ═══════════════════════════════════════════════════════════════

/// A fixed-period timer on the monotonic millisecond clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    period_ms: u64,
    /// When the timer last fired or was re-armed; `None` means due now.
    last: Option<u64>,
}

impl Interval {
    /// A timer that fires on the first `due` check.
    pub const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last: None,
        }
    }

    /// Returns `true` (and re-arms) when a full period has elapsed since
    /// the last firing.
    pub fn due(&mut self, now_ms: u64) -> bool {
        match self.last {
            Some(last) if now_ms.saturating_sub(last) < self.period_ms => false,
            _ => {
                self.last = Some(now_ms);
                true
            }
        }
    }

    /// Restart the period from `now_ms`; the next firing is one full
    /// period away.
    pub fn reset(&mut self, now_ms: u64) {
        self.last = Some(now_ms);
    }

    /// Make the next `due` check fire immediately.
    pub fn trigger(&mut self) {
        self.last = None;
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }
}
