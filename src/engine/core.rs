// src/engine/core.rs

//! Pure core supervisor state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`CoreInput`]s and produces:
//! - an updated supervisor state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Supervisor`) is responsible for:
//! - reading events from the runtime channel
//! - sleeping until the debounce deadline
//! - waiting for the child to exit
//! - actually stopping and starting the child
//!
//! Time is passed in explicitly, so the core is unit tested without Tokio,
//! channels, filesystem, or processes.

use std::time::{Duration, Instant};

use crate::engine::crash::CrashTracker;
use crate::engine::debounce::Debouncer;
use crate::engine::event_handlers::{
    handle_changes, handle_child_exit, handle_debounce_elapsed, handle_restart_request,
    handle_shutdown, CoreStep,
};
use crate::engine::SupervisorState;
use crate::process::ExitReport;
use crate::watch::ChangeEvent;

/// Tunables for the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreOptions {
    /// Quiet period before a burst of changes restarts the child.
    pub debounce: Duration,
    /// Optional ceiling on how long a burst may keep postponing a restart.
    pub max_wait: Option<Duration>,
    pub crash_loop_threshold: u32,
    pub min_uptime: Duration,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_wait: None,
            crash_loop_threshold: 3,
            min_uptime: Duration::from_secs(2),
        }
    }
}

/// Inputs to the core, already stripped of IO concerns.
#[derive(Debug, Clone)]
pub enum CoreInput {
    Changes { events: Vec<ChangeEvent>, now: Instant },
    DebounceElapsed { now: Instant },
    ChildExited(ExitReport),
    RestartRequested,
    ShutdownRequested,
}

#[derive(Debug)]
pub struct CoreSupervisor {
    state: SupervisorState,
    debouncer: Debouncer,
    crashes: CrashTracker,
}

impl CoreSupervisor {
    pub fn new(options: CoreOptions) -> Self {
        Self {
            state: SupervisorState::Idle,
            debouncer: Debouncer::new(options.debounce, options.max_wait),
            crashes: CrashTracker::new(options.crash_loop_threshold, options.min_uptime),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// The first child is up; start reacting to events.
    pub fn on_started(&mut self) {
        if self.state == SupervisorState::Idle {
            self.state = SupervisorState::Watching;
        }
    }

    /// The shell finished a stop-then-start cycle.
    pub fn on_restarted(&mut self) {
        if self.state == SupervisorState::Restarting {
            self.state = SupervisorState::Watching;
        }
    }

    /// When the shell should wake up to deliver `DebounceElapsed`.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Handle a single input, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, input: CoreInput) -> CoreStep {
        match input {
            CoreInput::Changes { events, now } => {
                handle_changes(self.state, &mut self.debouncer, &events, now)
            }
            CoreInput::DebounceElapsed { now } => {
                handle_debounce_elapsed(&mut self.state, &mut self.debouncer, now)
            }
            CoreInput::ChildExited(report) => {
                handle_child_exit(self.state, &mut self.crashes, report)
            }
            CoreInput::RestartRequested => {
                handle_restart_request(&mut self.state, &mut self.debouncer)
            }
            CoreInput::ShutdownRequested => handle_shutdown(&mut self.state, &mut self.debouncer),
        }
    }
}
