//! Connectivity monitor: periodic liveness check of the station link.
//!
//! Runs while the device is managed or reconnecting.  Each check either
//! resets the failure counter or bumps it; the verdict tells the
//! controller whether to retry the join or give up on the network.

use log::{info, warn};

use crate::scheduler::Interval;

/// Outcome of one link check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// The link is up; the failure counter is zero.
    Healthy,
    /// The link is down; rejoin and check again.
    Reconnect { failures: u8 },
    /// The link stayed down for the whole failure budget.
    Escalate { failures: u8 },
}

pub struct ConnectivityMonitor {
    interval: Interval,
    threshold: u8,
    failures: u8,
}

impl ConnectivityMonitor {
    pub fn new(period_ms: u64, threshold: u8) -> Self {
        Self {
            interval: Interval::new(period_ms),
            threshold,
            failures: 0,
        }
    }

    /// Check the link if a period has elapsed.  Returns `None` between
    /// checks.
    pub fn poll(&mut self, now_ms: u64, link_up: bool) -> Option<MonitorVerdict> {
        if !self.interval.due(now_ms) {
            return None;
        }

        if link_up {
            if self.failures > 0 {
                info!("Monitor: link restored after {} failed checks", self.failures);
            }
            self.failures = 0;
            return Some(MonitorVerdict::Healthy);
        }

        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.threshold {
            warn!("Monitor: link down for {} checks, giving up", self.failures);
            let failures = self.failures;
            self.failures = 0;
            return Some(MonitorVerdict::Escalate { failures });
        }

        warn!(
            "Monitor: link down ({}/{}), reconnecting",
            self.failures, self.threshold
        );
        Some(MonitorVerdict::Reconnect {
            failures: self.failures,
        })
    }

    /// Zero the counter and start a fresh period at `now_ms`.
    pub fn reset(&mut self, now_ms: u64) {
        self.failures = 0;
        self.interval.reset(now_ms);
    }

    pub fn failures(&self) -> u8 {
        self.failures
    }
}
