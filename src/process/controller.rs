// src/process/controller.rs

//! Lifecycle owner for the served process.
//!
//! The controller holds the one and only child slot. `start` refuses to run
//! while the slot is occupied, and `stop` / `wait_exit` only empty the slot
//! once the process has been reaped, so there is never a window with two
//! live children.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::env::EnvSource;
use crate::errors::LaunchError;

use super::backend::{ChildProcess, CommandSpec, ExitInfo, ProcessBackend};

/// `Stopped -> Starting -> Running -> Stopping -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Snapshot of the live child, returned by [`ChildController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildInfo {
    pub pid: Option<u32>,
    pub started_at: Instant,
}

/// How a supervisor-initiated stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// There was no child to stop.
    NotRunning,
    /// The child exited within the grace period.
    Exited(ExitInfo),
    /// The grace period expired and the child was killed.
    Killed(ExitInfo),
}

/// A child that exited on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub pid: Option<u32>,
    pub exit: ExitInfo,
    pub uptime: Duration,
}

struct RunningChild {
    process: Box<dyn ChildProcess>,
    pid: Option<u32>,
    started_at: Instant,
}

pub struct ChildController<B: ProcessBackend> {
    backend: B,
    command: CommandSpec,
    env: EnvSource,
    grace: Duration,
    state: ChildState,
    current: Option<RunningChild>,
    last_exit: Option<ExitInfo>,
}

impl<B: ProcessBackend> fmt::Debug for ChildController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildController")
            .field("command", &self.command)
            .field("state", &self.state)
            .field("pid", &self.current_pid())
            .field("last_exit", &self.last_exit)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> ChildController<B> {
    pub fn new(backend: B, command: CommandSpec, env: EnvSource, grace: Duration) -> Self {
        Self {
            backend,
            command,
            env,
            grace,
            state: ChildState::Stopped,
            current: None,
            last_exit: None,
        }
    }

    pub fn state(&self) -> ChildState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_pid(&self) -> Option<u32> {
        self.current.as_ref().and_then(|c| c.pid)
    }

    /// Exit status of the most recent child, absent while one is running.
    pub fn last_exit(&self) -> Option<ExitInfo> {
        self.last_exit
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Launch the served process.
    ///
    /// The env file (if any) is re-read on every call.
    pub fn start(&mut self) -> Result<ChildInfo, LaunchError> {
        if let Some(running) = &self.current {
            return Err(LaunchError::AlreadyRunning { pid: running.pid });
        }

        self.state = ChildState::Starting;
        let env = self.env.load();
        let process = match self.backend.spawn(&self.command, env) {
            Ok(process) => process,
            Err(err) => {
                self.state = ChildState::Stopped;
                return Err(err);
            }
        };

        let info = ChildInfo {
            pid: process.id(),
            started_at: Instant::now(),
        };
        self.current = Some(RunningChild {
            process,
            pid: info.pid,
            started_at: info.started_at,
        });
        self.last_exit = None;
        self.state = ChildState::Running;

        info!(pid = ?info.pid, command = %self.command, "child started");
        Ok(info)
    }

    /// Ask the child to exit, escalating to a kill after the grace period.
    ///
    /// Returns only once the child has been reaped and its process group
    /// cleared. No-op without a child.
    pub async fn stop(&mut self) -> StopOutcome {
        self.stop_or_force(std::future::pending()).await
    }

    /// [`stop`](Self::stop), but skip the rest of the grace period and kill
    /// as soon as `force` resolves.
    pub async fn stop_or_force<F>(&mut self, force: F) -> StopOutcome
    where
        F: Future<Output = ()>,
    {
        let Some(mut running) = self.current.take() else {
            return StopOutcome::NotRunning;
        };
        self.state = ChildState::Stopping;
        let pid = running.pid;

        if let Err(err) = running.process.terminate() {
            warn!(?pid, error = %err, "failed to send termination request");
        }

        let graceful = tokio::select! {
            res = timeout(self.grace, running.process.wait()) => Some(res),
            _ = force => None,
        };

        let outcome = match graceful {
            Some(Ok(Ok(exit))) => {
                info!(?pid, exit_code = ?exit.code, signal = ?exit.signal, "child stopped");
                StopOutcome::Exited(exit)
            }
            Some(Ok(Err(err))) => {
                warn!(?pid, error = %err, "waiting for child failed; killing");
                StopOutcome::Killed(force_kill(running.process.as_mut(), pid).await)
            }
            Some(Err(_)) => {
                warn!(
                    ?pid,
                    grace_ms = self.grace.as_millis() as u64,
                    "child ignored termination request; killing"
                );
                StopOutcome::Killed(force_kill(running.process.as_mut(), pid).await)
            }
            None => {
                warn!(?pid, "forced stop requested; killing");
                StopOutcome::Killed(force_kill(running.process.as_mut(), pid).await)
            }
        };
        kill_leftovers(running.process.as_mut(), pid);

        if let StopOutcome::Exited(exit) | StopOutcome::Killed(exit) = outcome {
            self.last_exit = Some(exit);
        }
        self.state = ChildState::Stopped;
        outcome
    }

    /// Resolve when the current child exits on its own.
    ///
    /// Pending forever when there is no child, so it can sit in a
    /// `select!` unconditionally. Cancel safe.
    pub async fn wait_exit(&mut self) -> ExitReport {
        let Some(running) = self.current.as_mut() else {
            return std::future::pending().await;
        };

        let exit = match running.process.wait().await {
            Ok(exit) => exit,
            Err(err) => {
                warn!(pid = ?running.pid, error = %err, "lost track of child; killing it");
                if let Err(err) = running.process.kill() {
                    debug!(error = %err, "kill after failed wait also failed");
                }
                ExitInfo::unknown()
            }
        };
        kill_leftovers(running.process.as_mut(), running.pid);

        let (pid, uptime) = match self.current.take() {
            Some(running) => (running.pid, running.started_at.elapsed()),
            None => (None, Duration::ZERO),
        };
        self.last_exit = Some(exit);
        self.state = ChildState::Stopped;

        ExitReport { pid, exit, uptime }
    }
}

fn kill_leftovers(process: &mut dyn ChildProcess, pid: Option<u32>) {
    if let Err(err) = process.kill_leftovers() {
        warn!(?pid, error = %err, "failed to kill leftover processes of the child");
    }
}

async fn force_kill(process: &mut dyn ChildProcess, pid: Option<u32>) -> ExitInfo {
    if let Err(err) = process.kill() {
        warn!(?pid, error = %err, "failed to kill child");
    }
    match process.wait().await {
        Ok(exit) => {
            info!(?pid, exit_code = ?exit.code, signal = ?exit.signal, "child killed");
            exit
        }
        Err(err) => {
            warn!(?pid, error = %err, "failed to reap killed child");
            ExitInfo::unknown()
        }
    }
}
