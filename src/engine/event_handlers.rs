// src/engine/event_handlers.rs

//! Event handling logic for the core supervisor.

use std::time::Instant;

use crate::engine::crash::CrashTracker;
use crate::engine::debounce::Debouncer;
use crate::engine::{RestartReason, SupervisorState};
use crate::errors::ChildCrash;
use crate::process::ExitReport;
use crate::watch::ChangeEvent;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Stop the current child (if any), then start a new one.
    Restart(RestartReason),
    /// The child died with a failure status outside a supervisor stop.
    ReportCrash(ChildCrash),
    /// The crash streak reached the configured threshold.
    WarnCrashLoop(u32),
    /// The child exited with status 0 outside a supervisor stop.
    ReportCleanExit(ExitReport),
    /// Stop the child and leave the loop.
    Shutdown,
}

/// Decision returned by the core after handling a single input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }

    fn run(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Feed relevant changes into the debouncer. Nothing happens until the
/// quiet period elapses.
pub fn handle_changes(
    state: SupervisorState,
    debouncer: &mut Debouncer,
    events: &[ChangeEvent],
    now: Instant,
) -> CoreStep {
    if state == SupervisorState::ShuttingDown {
        return CoreStep::idle();
    }
    for event in events {
        debouncer.observe(event, now);
    }
    CoreStep::idle()
}

/// The debounce deadline was reached: emit at most one restart.
pub fn handle_debounce_elapsed(
    state: &mut SupervisorState,
    debouncer: &mut Debouncer,
    now: Instant,
) -> CoreStep {
    if *state != SupervisorState::Watching {
        return CoreStep::idle();
    }
    match debouncer.take_ready(now) {
        Some(signal) => {
            *state = SupervisorState::Restarting;
            CoreStep::run(vec![CoreCommand::Restart(RestartReason::FileChange {
                count: signal.changes,
                sample: signal.sample,
            })])
        }
        None => CoreStep::idle(),
    }
}

/// The child exited without being asked to. Report it and keep watching;
/// the next change or restart request brings it back.
pub fn handle_child_exit(
    state: SupervisorState,
    crashes: &mut CrashTracker,
    report: ExitReport,
) -> CoreStep {
    if state == SupervisorState::ShuttingDown {
        return CoreStep::idle();
    }

    let streak = crashes.record(&report);
    if report.exit.success() {
        return CoreStep::run(vec![CoreCommand::ReportCleanExit(report)]);
    }

    let mut commands = vec![CoreCommand::ReportCrash(ChildCrash {
        pid: report.pid,
        exit: report.exit,
    })];
    if let Some(n) = streak {
        commands.push(CoreCommand::WarnCrashLoop(n));
    }
    CoreStep::run(commands)
}

/// Explicit restart: bypasses the debouncer and absorbs any pending burst.
pub fn handle_restart_request(
    state: &mut SupervisorState,
    debouncer: &mut Debouncer,
) -> CoreStep {
    if *state != SupervisorState::Watching {
        return CoreStep::idle();
    }
    debouncer.clear();
    *state = SupervisorState::Restarting;
    CoreStep::run(vec![CoreCommand::Restart(RestartReason::Requested)])
}

pub fn handle_shutdown(state: &mut SupervisorState, debouncer: &mut Debouncer) -> CoreStep {
    *state = SupervisorState::ShuttingDown;
    debouncer.clear();
    CoreStep {
        commands: vec![CoreCommand::Shutdown],
        keep_running: false,
    }
}
