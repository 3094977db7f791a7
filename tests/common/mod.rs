#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use watchserve::engine::{CoreOptions, CoreSupervisor, RuntimeEvent, Supervisor};
use watchserve::env::EnvSource;
use watchserve::errors::Result;
use watchserve::process::{ChildController, CommandSpec};
use watchserve::watch::{ChangeEvent, ChangeKind};

pub use watchserve_test_utils::{
    eventually, init_tracing, with_timeout, FakeBackend, SettingsBuilder,
};

/// Core options with a short quiet period for tests.
pub fn fast_options(debounce_ms: u64) -> CoreOptions {
    CoreOptions {
        debounce: Duration::from_millis(debounce_ms),
        max_wait: None,
        crash_loop_threshold: 3,
        min_uptime: Duration::from_secs(2),
    }
}

/// Spawn a supervisor over `backend` and return the channel feeding it.
pub fn spawn_supervisor(
    backend: FakeBackend,
    options: CoreOptions,
    grace: Duration,
) -> (mpsc::Sender<RuntimeEvent>, JoinHandle<Result<()>>) {
    spawn_supervisor_with_env(backend, options, grace, EnvSource::none())
}

pub fn spawn_supervisor_with_env(
    backend: FakeBackend,
    options: CoreOptions,
    grace: Duration,
    env: EnvSource,
) -> (mpsc::Sender<RuntimeEvent>, JoinHandle<Result<()>>) {
    let (tx, rx) = mpsc::channel(64);
    let controller = ChildController::new(
        backend,
        CommandSpec::Shell("serve".into()),
        env,
        grace,
    );
    let supervisor = Supervisor::new(CoreSupervisor::new(options), rx, controller);
    (tx, tokio::spawn(supervisor.run()))
}

pub fn changed(path: &str) -> RuntimeEvent {
    RuntimeEvent::Changes(vec![ChangeEvent::new(path, ChangeKind::Modified)])
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
