// src/engine/debounce.rs

//! Debounce coalescer.
//!
//! Every relevant change pushes the deadline out to `last + quiet`. When a
//! `max_wait` ceiling is configured the deadline never moves past
//! `first + max_wait`, so a constant stream of writes still restarts
//! eventually. A settled burst is handed out exactly once.

use std::time::{Duration, Instant};

use crate::watch::ChangeEvent;

/// "Enough related changes have settled; restart now."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSignal {
    pub at: Instant,
    /// Number of changes coalesced into this signal.
    pub changes: usize,
    /// Most recent changed path, for logging.
    pub sample: String,
}

#[derive(Debug, Clone)]
struct Pending {
    first: Instant,
    last: Instant,
    changes: usize,
    sample: String,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    max_wait: Option<Duration>,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(quiet: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            quiet,
            max_wait,
            pending: None,
        }
    }

    /// Record a relevant change at `now`, restarting the quiet period.
    pub fn observe(&mut self, event: &ChangeEvent, now: Instant) {
        match &mut self.pending {
            Some(p) => {
                p.last = p.last.max(now);
                p.changes += 1;
                p.sample.clone_from(&event.path);
            }
            None => {
                self.pending = Some(Pending {
                    first: now,
                    last: now,
                    changes: 1,
                    sample: event.path.clone(),
                });
            }
        }
    }

    /// When the pending burst settles, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        let p = self.pending.as_ref()?;
        let quiet_end = p.last + self.quiet;
        Some(match self.max_wait {
            Some(max) => quiet_end.min(p.first + max),
            None => quiet_end,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Hand out the settled burst, once.
    pub fn take_ready(&mut self, now: Instant) -> Option<RestartSignal> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.pending.take().map(|p| RestartSignal {
            at: now,
            changes: p.changes,
            sample: p.sample,
        })
    }

    /// True exactly once per settled burst.
    pub fn poll_ready(&mut self, now: Instant) -> bool {
        self.take_ready(now).is_some()
    }

    /// Forget pending changes; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        self.pending.take().map_or(0, |p| p.changes)
    }
}
