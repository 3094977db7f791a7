use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;
use watchserve::errors::LaunchError;
use watchserve::process::{BoxFuture, ChildProcess, CommandSpec, ExitInfo, ProcessBackend};

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

/// Shared bookkeeping for [`FakeBackend`].
#[derive(Debug, Default)]
pub struct FakeState {
    /// Successful spawns so far.
    pub spawned: usize,
    /// Fake processes that have not been reaped yet.
    pub alive: usize,
    /// Highest `alive` ever observed.
    pub max_alive: usize,
    /// Spawns that happened while another fake process was still alive.
    pub overlapping_spawns: usize,
    pub terminated: usize,
    pub killed: usize,
    /// Process-group cleanups requested after a child was reaped.
    pub group_cleanups: usize,
    /// When set, termination requests are ignored and only `kill` works.
    pub ignore_term: bool,
    pub commands: Vec<String>,
    pub last_env: Vec<(String, String)>,
    fail_next_spawn: Option<io::ErrorKind>,
    current: Option<Arc<watch::Sender<Option<ExitInfo>>>>,
}

/// A fake process backend that:
/// - records every spawn, its command and environment
/// - tracks how many fake processes are alive at once
/// - lets tests make the current child exit with a chosen status
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn spawned(&self) -> usize {
        self.state().spawned
    }

    pub fn alive(&self) -> usize {
        self.state().alive
    }

    pub fn max_alive(&self) -> usize {
        self.state().max_alive
    }

    pub fn overlapping_spawns(&self) -> usize {
        self.state().overlapping_spawns
    }

    pub fn set_ignore_term(&self, ignore: bool) {
        self.state().ignore_term = ignore;
    }

    /// Make the next spawn fail as if the OS returned `kind`.
    pub fn fail_next_spawn(&self, kind: io::ErrorKind) {
        self.state().fail_next_spawn = Some(kind);
    }

    /// Make the most recently spawned child exit with `code`.
    pub fn crash_current(&self, code: i32) {
        let current = self.state().current.clone();
        if let Some(tx) = current {
            finish(&tx, ExitInfo::from_code(code));
        }
    }
}

impl ProcessBackend for FakeBackend {
    fn spawn(
        &mut self,
        command: &CommandSpec,
        env: &[(String, String)],
    ) -> Result<Box<dyn ChildProcess>, LaunchError> {
        let mut state = self.state();
        if let Some(kind) = state.fail_next_spawn.take() {
            return Err(LaunchError::from_spawn(command.program(), io::Error::from(kind)));
        }

        if state.alive > 0 {
            state.overlapping_spawns += 1;
        }
        state.spawned += 1;
        state.alive += 1;
        state.max_alive = state.max_alive.max(state.alive);
        state.commands.push(command.to_string());
        state.last_env = env.to_vec();

        let (exit_tx, exit_rx) = watch::channel(None);
        let exit_tx = Arc::new(exit_tx);
        state.current = Some(Arc::clone(&exit_tx));

        let pid = 1000 + state.spawned as u32;
        debug!(pid, command = %command, alive = state.alive, "fake child spawned");

        Ok(Box::new(FakeChild {
            pid,
            exit_tx,
            exit_rx,
            state: Arc::clone(&self.state),
            reaped: false,
        }))
    }
}

fn finish(tx: &watch::Sender<Option<ExitInfo>>, exit: ExitInfo) {
    tx.send_if_modified(|slot| {
        if slot.is_none() {
            *slot = Some(exit);
            true
        } else {
            false
        }
    });
}

struct FakeChild {
    pid: u32,
    exit_tx: Arc<watch::Sender<Option<ExitInfo>>>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    state: Arc<Mutex<FakeState>>,
    reaped: bool,
}

impl FakeChild {
    fn mark_reaped(&mut self) {
        if !self.reaped {
            self.reaped = true;
            self.state.lock().unwrap().alive -= 1;
        }
    }
}

impl ChildProcess for FakeChild {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> io::Result<()> {
        let ignore = {
            let mut state = self.state.lock().unwrap();
            state.terminated += 1;
            state.ignore_term
        };
        if !ignore {
            finish(&self.exit_tx, ExitInfo::from_signal(SIGTERM));
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().killed += 1;
        finish(&self.exit_tx, ExitInfo::from_signal(SIGKILL));
        Ok(())
    }

    fn kill_leftovers(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().group_cleanups += 1;
        Ok(())
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<ExitInfo>> {
        Box::pin(async move {
            loop {
                let current = *self.exit_rx.borrow_and_update();
                if let Some(exit) = current {
                    self.mark_reaped();
                    return Ok(exit);
                }
                if self.exit_rx.changed().await.is_err() {
                    return Err(io::Error::other("fake child channel closed"));
                }
            }
        })
    }
}

impl Drop for FakeChild {
    fn drop(&mut self) {
        // Mirrors kill_on_drop.
        finish(&self.exit_tx, ExitInfo::from_signal(SIGKILL));
        self.mark_reaped();
    }
}
