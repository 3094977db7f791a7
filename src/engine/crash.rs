// src/engine/crash.rs

//! Crash-loop bookkeeping.

use std::time::Duration;

use crate::process::ExitReport;

/// Counts consecutive short-lived unexpected exits.
///
/// An exit counts when it is not a success and happened less than
/// `min_uptime` after the child started. A success, or a child that stayed
/// up at least `min_uptime`, resets the count.
#[derive(Debug, Clone)]
pub struct CrashTracker {
    threshold: u32,
    min_uptime: Duration,
    consecutive: u32,
}

impl CrashTracker {
    pub fn new(threshold: u32, min_uptime: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            min_uptime,
            consecutive: 0,
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Record an unexpected exit. Returns the streak length when it has
    /// reached the crash-loop threshold.
    pub fn record(&mut self, report: &ExitReport) -> Option<u32> {
        if report.exit.success() || report.uptime >= self.min_uptime {
            self.consecutive = 0;
            return None;
        }
        self.consecutive += 1;
        (self.consecutive >= self.threshold).then_some(self.consecutive)
    }
}
