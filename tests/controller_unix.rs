// tests/controller_unix.rs
//
// ChildController over real processes. Unix only: relies on `sh`, `sleep`
// and process-group signalling.
#![cfg(unix)]

mod common;
use crate::common::{eventually, init_tracing, with_timeout, write_file};

use std::time::Duration;

use watchserve::env::EnvSource;
use watchserve::errors::LaunchError;
use watchserve::process::{
    ChildController, ChildState, CommandSpec, StopOutcome, TokioBackend,
};

fn shell(cmd: &str) -> CommandSpec {
    CommandSpec::Shell(cmd.to_string())
}

fn controller(command: CommandSpec, grace: Duration) -> ChildController<TokioBackend> {
    ChildController::new(TokioBackend, command, EnvSource::none(), grace)
}

#[tokio::test]
async fn graceful_stop_terminates_a_well_behaved_child() {
    init_tracing();
    let mut ctl = controller(
        CommandSpec::Argv {
            program: "sleep".into(),
            args: vec!["30".into()],
        },
        Duration::from_secs(5),
    );

    let info = ctl.start().unwrap();
    assert!(info.pid.is_some());
    assert_eq!(ctl.state(), ChildState::Running);

    let outcome = with_timeout(ctl.stop()).await;
    match outcome {
        StopOutcome::Exited(exit) => assert_eq!(exit.signal, Some(15)),
        other => panic!("expected graceful exit, got {other:?}"),
    }
    assert_eq!(ctl.state(), ChildState::Stopped);
    assert!(!ctl.is_running());
    assert_eq!(with_timeout(ctl.stop()).await, StopOutcome::NotRunning);
}

#[tokio::test]
async fn child_ignoring_sigterm_is_killed_after_grace() {
    init_tracing();
    let mut ctl = controller(shell("trap '' TERM; sleep 30"), Duration::from_millis(300));

    ctl.start().unwrap();
    // Give the shell time to install the trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    match with_timeout(ctl.stop()).await {
        StopOutcome::Killed(exit) => assert_eq!(exit.signal, Some(9)),
        other => panic!("expected kill after grace period, got {other:?}"),
    }
    assert!(!ctl.is_running());
}

#[tokio::test]
async fn spontaneous_exit_is_observed_with_its_status() {
    init_tracing();
    let mut ctl = controller(shell("exit 3"), Duration::from_secs(1));

    ctl.start().unwrap();
    let report = with_timeout(ctl.wait_exit()).await;

    assert_eq!(report.exit.code, Some(3));
    assert!(report.pid.is_some());
    assert!(!ctl.is_running());
    assert_eq!(ctl.last_exit().and_then(|e| e.code), Some(3));
}

#[tokio::test]
async fn missing_executable_is_a_launch_error() {
    init_tracing();
    let mut ctl = controller(
        CommandSpec::Argv {
            program: "watchserve-definitely-missing-binary".into(),
            args: vec![],
        },
        Duration::from_secs(1),
    );

    let err = ctl.start().unwrap_err();
    assert!(matches!(err, LaunchError::NotFound { .. }), "got {err:?}");
    assert_eq!(ctl.state(), ChildState::Stopped);
}

#[tokio::test]
async fn second_start_is_refused_while_child_runs() {
    init_tracing();
    let mut ctl = controller(shell("sleep 30"), Duration::from_secs(2));

    let first = ctl.start().unwrap();
    let err = ctl.start().unwrap_err();
    assert!(matches!(err, LaunchError::AlreadyRunning { pid } if pid == first.pid));

    with_timeout(ctl.stop()).await;
    ctl.start().unwrap();
    with_timeout(ctl.stop()).await;
}

#[tokio::test]
async fn env_file_entries_override_inherited_environment() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        ".env",
        "HOME=/srv/from-env-file\nWATCHSERVE_TEST_GREETING=\"hello there\"\n",
    );
    let env = EnvSource::from_file(dir.path().join(".env")).unwrap();

    let mut ctl = ChildController::new(
        TokioBackend,
        shell(r#"[ "$HOME" = /srv/from-env-file ] && [ "$WATCHSERVE_TEST_GREETING" = "hello there" ] && [ -n "$PATH" ]"#),
        env,
        Duration::from_secs(1),
    );

    ctl.start().unwrap();
    let report = with_timeout(ctl.wait_exit()).await;
    assert_eq!(report.exit.code, Some(0), "child did not see the env file entries");
}

/// Alive and not a zombie waiting to be reaped by init.
fn process_alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // State is the first field after the parenthesised command name.
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z"),
        Err(_) if std::path::Path::new("/proc/self").exists() => false,
        // No procfs: ask the kernel directly.
        Err(_) => unsafe { libc::kill(pid, 0) == 0 },
    }
}

/// Wait for the child to write a background job's pid into `path`.
async fn read_pid_file(path: &std::path::Path) -> i32 {
    let appeared = eventually(Duration::from_secs(5), || {
        std::fs::read_to_string(path).is_ok_and(|s| s.trim().parse::<i32>().is_ok())
    })
    .await;
    assert!(appeared, "child never wrote {}", path.display());
    std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
}

#[tokio::test]
async fn background_jobs_die_with_a_crashed_child() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("job.pid");
    let mut ctl = controller(
        shell(&format!("sleep 4711 & echo $! > '{}'; exit 1", pid_file.display())),
        Duration::from_secs(1),
    );

    ctl.start().unwrap();
    let report = with_timeout(ctl.wait_exit()).await;
    assert_eq!(report.exit.code, Some(1));

    let job = read_pid_file(&pid_file).await;
    assert!(
        eventually(Duration::from_secs(3), || !process_alive(job)).await,
        "background job {job} outlived its crashed parent"
    );
    assert_eq!(with_timeout(ctl.stop()).await, StopOutcome::NotRunning);
}

#[tokio::test]
async fn stubborn_background_jobs_die_with_a_gracefully_stopped_child() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("job.pid");
    let mut ctl = controller(
        shell(&format!(
            "(trap '' TERM; sleep 4712) & echo $! > '{}'; sleep 30",
            pid_file.display()
        )),
        Duration::from_secs(5),
    );

    ctl.start().unwrap();
    let job = read_pid_file(&pid_file).await;
    assert!(process_alive(job));

    match with_timeout(ctl.stop()).await {
        StopOutcome::Exited(exit) => assert_eq!(exit.signal, Some(15)),
        other => panic!("expected the shell to exit on SIGTERM, got {other:?}"),
    }
    assert!(
        eventually(Duration::from_secs(3), || !process_alive(job)).await,
        "job {job} ignoring SIGTERM survived stop()"
    );
}

#[tokio::test]
async fn forced_stop_skips_the_rest_of_the_grace_period() {
    init_tracing();
    let mut ctl = controller(shell("trap '' TERM; sleep 30"), Duration::from_secs(30));

    ctl.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = std::time::Instant::now();
    let outcome = with_timeout(
        ctl.stop_or_force(tokio::time::sleep(Duration::from_millis(100))),
    )
    .await;

    assert!(matches!(outcome, StopOutcome::Killed(exit) if exit.signal == Some(9)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!ctl.is_running());
}
