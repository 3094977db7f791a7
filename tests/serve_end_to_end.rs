// tests/serve_end_to_end.rs
//
// Full wiring: real detector on a temp dir, supervisor loop, fake process
// backend.

mod common;
use crate::common::{eventually, init_tracing, with_timeout, write_file, FakeBackend, SettingsBuilder};

use std::time::Duration;

use tokio::sync::mpsc;

use watchserve::engine::RuntimeEvent;
use watchserve::serve;
use watchserve::types::WatchMode;

/// Modify an excluded file and expect nothing, then modify a source file
/// and expect exactly one restart.
async fn excluded_churn_is_ignored_and_source_change_restarts(mode: WatchMode) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write_file(&root, "app.py", "print('v1')\n");
    write_file(&root, ".cache/tmp", "0");

    let settings = SettingsBuilder::new(&root)
        .mode(mode)
        .poll_interval(Duration::from_millis(50))
        .debounce(Duration::from_millis(150))
        .exclude(".cache/*")
        .build();

    let backend = FakeBackend::new();
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let handle = tokio::spawn(serve(settings, backend.clone(), tx.clone(), rx));

    assert!(eventually(Duration::from_secs(3), || backend.spawned() == 1).await);
    // Let the poll baseline / native subscription settle.
    tokio::time::sleep(Duration::from_millis(300)).await;

    write_file(&root, ".cache/tmp", "churn churn churn");
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(backend.spawned(), 1, "excluded path triggered a restart");

    write_file(&root, "app.py", "print('version two')\n");
    assert!(
        eventually(Duration::from_secs(5), || backend.spawned() == 2).await,
        "source change did not restart the child"
    );
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.spawned(), 2, "one edit restarted more than once");

    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
    with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(backend.alive(), 0);
    assert_eq!(backend.overlapping_spawns(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn poll_mode_end_to_end() {
    excluded_churn_is_ignored_and_source_change_restarts(WatchMode::Poll).await;
}

// Native notifications may be unavailable in some sandboxes; serve() then
// falls back to polling and the scenario still holds.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn native_mode_end_to_end() {
    excluded_churn_is_ignored_and_source_change_restarts(WatchMode::Native).await;
}

#[tokio::test]
async fn missing_env_file_fails_before_anything_starts() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let settings = SettingsBuilder::new(dir.path())
        .env_file(dir.path().join("absent.env"))
        .build();

    let backend = FakeBackend::new();
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(8);
    let err = serve(settings, backend.clone(), tx, rx).await.unwrap_err();

    assert!(matches!(err, watchserve::errors::WatchserveError::EnvFile(_)));
    assert_eq!(backend.spawned(), 0);
}
