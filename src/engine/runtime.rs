// src/engine/runtime.rs

use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::process::{ChildController, ProcessBackend, StopOutcome};

use super::core::{CoreInput, CoreSupervisor};
use super::{CoreCommand, RuntimeEvent};

/// What woke the loop up.
enum Wake {
    Event(Option<RuntimeEvent>),
    ChildExited(crate::process::ExitReport),
    DebounceElapsed,
}

/// Drives the core supervisor in response to `RuntimeEvent`s, child exits
/// and debounce deadlines, and delegates process handling to a
/// `ChildController`.
///
/// This is a pure IO shell around `CoreSupervisor`, which contains all the
/// restart semantics. It is the only place the child slot is touched.
pub struct Supervisor<B: ProcessBackend> {
    core: CoreSupervisor,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    controller: ChildController<B>,
}

impl<B: ProcessBackend> fmt::Debug for Supervisor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> Supervisor<B> {
    pub fn new(
        core: CoreSupervisor,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        controller: ChildController<B>,
    ) -> Self {
        Self {
            core,
            event_rx,
            controller,
        }
    }

    /// Main loop.
    ///
    /// Starts the child, then waits on three sources at once: the runtime
    /// channel, the child exiting, and the debounce deadline. Returns `Ok`
    /// after a requested shutdown, with the child stopped, and `Err` only
    /// when the child cannot be launched.
    pub async fn run(mut self) -> Result<()> {
        info!(command = %self.controller.command(), "watchserve supervisor started");

        self.controller.start()?;
        self.core.on_started();

        loop {
            let deadline = self.core.debounce_deadline();
            let child_running = self.controller.is_running();

            let wake = tokio::select! {
                event = self.event_rx.recv() => Wake::Event(event),
                report = self.controller.wait_exit(), if child_running => Wake::ChildExited(report),
                _ = sleep_until(deadline), if deadline.is_some() => Wake::DebounceElapsed,
            };

            let input = match wake {
                Wake::Event(Some(RuntimeEvent::Changes(events))) => {
                    for change in &events {
                        debug!(path = %change.path, kind = %change.kind, "relevant change");
                    }
                    CoreInput::Changes {
                        events,
                        now: Instant::now(),
                    }
                }
                Wake::Event(Some(RuntimeEvent::WatchFailed(err))) => {
                    if err.is_recoverable() {
                        warn!(error = %err, path = ?err.path(), "watch error; continuing");
                    } else {
                        error!(error = %err, "watch error; changes may be missed");
                    }
                    continue;
                }
                Wake::Event(Some(RuntimeEvent::RestartRequested)) => CoreInput::RestartRequested,
                Wake::Event(Some(RuntimeEvent::ShutdownRequested)) => {
                    info!("shutdown requested");
                    CoreInput::ShutdownRequested
                }
                Wake::Event(None) => {
                    info!("runtime event channel closed; shutting down");
                    CoreInput::ShutdownRequested
                }
                Wake::ChildExited(report) => CoreInput::ChildExited(report),
                Wake::DebounceElapsed => CoreInput::DebounceElapsed {
                    now: Instant::now(),
                },
            };

            // Feed the input into the pure core and get commands back.
            let step = self.core.step(input);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                break;
            }
        }

        info!("supervisor exiting");
        Ok(())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Restart(reason) => {
                info!(reason = %reason, "restarting child");
                let outcome = self.controller.stop().await;
                debug!(?outcome, "previous child stopped");
                // A launch failure here ends the loop; the slot is empty, so
                // nothing is left running.
                self.controller.start()?;
                self.core.on_restarted();
            }
            CoreCommand::ReportCrash(crash) => {
                warn!(
                    pid = ?crash.pid,
                    exit_code = ?crash.exit.code,
                    signal = ?crash.exit.signal,
                    "{crash}; waiting for a change before restarting"
                );
            }
            CoreCommand::WarnCrashLoop(consecutive) => {
                warn!(consecutive, "child keeps crashing shortly after start");
            }
            CoreCommand::ReportCleanExit(report) => {
                info!(
                    pid = ?report.pid,
                    uptime_ms = report.uptime.as_millis() as u64,
                    "child exited cleanly; waiting for a change before restarting"
                );
            }
            CoreCommand::Shutdown => {
                // A second shutdown request (Ctrl-C again) cuts the grace
                // period short.
                let force = next_shutdown_request(&mut self.event_rx);
                match self.controller.stop_or_force(force).await {
                    StopOutcome::NotRunning => debug!("no child running at shutdown"),
                    outcome => info!(?outcome, "child stopped for shutdown"),
                }
            }
        }
        Ok(())
    }
}

/// Resolve on the next `ShutdownRequested`; other events are dropped.
async fn next_shutdown_request(event_rx: &mut mpsc::Receiver<RuntimeEvent>) {
    loop {
        match event_rx.recv().await {
            Some(RuntimeEvent::ShutdownRequested) => return,
            Some(_) => continue,
            None => return std::future::pending().await,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
