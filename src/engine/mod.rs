// src/engine/mod.rs

//! Supervision engine for watchserve.
//!
//! This module ties together:
//! - the debounce coalescer (bursts of changes -> one restart signal)
//! - crash bookkeeping (unexpected exits, crash-loop warnings)
//! - the main supervisor loop that reacts to:
//!   - filesystem changes and watch errors
//!   - the child exiting on its own
//!   - explicit restart and shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;

use crate::errors::WatchError;
use crate::watch::ChangeEvent;

/// Events flowing into the supervisor from detectors and signal handlers.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// Relevant (already filtered) filesystem changes.
    Changes(Vec<ChangeEvent>),
    /// A recoverable problem seen by a detector.
    WatchFailed(WatchError),
    /// Restart now, bypassing the debouncer (SIGHUP).
    RestartRequested,
    /// Graceful shutdown requested (Ctrl-C, SIGTERM).
    ShutdownRequested,
}

/// `Idle -> Watching -> Restarting -> Watching -> ... -> ShuttingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Constructed; the first child has not been started yet.
    Idle,
    Watching,
    Restarting,
    ShuttingDown,
}

/// Why the child is being cycled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// The debouncer settled after `count` changes.
    FileChange { count: usize, sample: String },
    /// Explicit request (SIGHUP).
    Requested,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::FileChange { count: 1, sample } => write!(f, "{sample} changed"),
            RestartReason::FileChange { count, sample } => {
                write!(f, "{sample} and {} other change(s)", count - 1)
            }
            RestartReason::Requested => f.write_str("restart requested"),
        }
    }
}

pub mod core;
pub mod crash;
pub mod debounce;
pub mod event_handlers;
pub mod runtime;

pub use core::{CoreInput, CoreOptions, CoreSupervisor};
pub use crash::CrashTracker;
pub use debounce::{Debouncer, RestartSignal};
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Supervisor;
