// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod process;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{discover, ConfigFile, Settings};
use crate::engine::{CoreSupervisor, RuntimeEvent, Supervisor};
use crate::env::EnvSource;
use crate::process::{ChildController, ProcessBackend, TokioBackend};
use crate::types::WatchMode;
use crate::watch::{ChangeDetector, DetectorHandle, WatchFilter, WatchTarget};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config discovery and command-line overrides
/// - the change detector
/// - the supervisor loop and the real process backend
/// - Ctrl-C / SIGTERM / SIGHUP handling
pub async fn run(args: CliArgs) -> Result<()> {
    let (cfg, base_dir) = match discover(args.config.as_deref())? {
        Some(loaded) => (loaded.config, loaded.base_dir),
        None => (ConfigFile::default(), PathBuf::from(".")),
    };
    let settings = Settings::resolve(&cfg, &base_dir, &args.overrides())?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    spawn_signal_handlers(rt_tx.clone());

    serve(settings, TokioBackend, rt_tx, rt_rx).await?;
    Ok(())
}

/// Watch and supervise until shutdown, with an injectable backend and
/// event channel.
///
/// `rt_tx` is handed to the detector; callers may keep clones to send
/// their own [`RuntimeEvent`]s.
pub async fn serve<B: ProcessBackend>(
    settings: Settings,
    backend: B,
    rt_tx: mpsc::Sender<RuntimeEvent>,
    rt_rx: mpsc::Receiver<RuntimeEvent>,
) -> errors::Result<()> {
    let filter = settings.watch_filter()?;
    let detector = start_detector(&settings.target, filter, rt_tx)?;

    let env = match &settings.env_file {
        Some(path) => EnvSource::from_file(path)?,
        None => EnvSource::none(),
    };
    let controller = ChildController::new(
        backend,
        settings.command.clone(),
        env,
        settings.grace_period,
    );
    let core = CoreSupervisor::new(settings.core_options());

    info!(
        root = %settings.target.root.display(),
        mode = %settings.target.mode,
        "watching for changes"
    );

    let result = Supervisor::new(core, rt_rx, controller).run().await;
    detector.shutdown();
    result
}

/// Start the configured detector. Native watching that cannot start falls
/// back to polling.
fn start_detector(
    target: &WatchTarget,
    filter: WatchFilter,
    rt_tx: mpsc::Sender<RuntimeEvent>,
) -> errors::Result<DetectorHandle> {
    match ChangeDetector::from_target(target, filter.clone()).spawn(rt_tx.clone()) {
        Ok(handle) => Ok(handle),
        Err(err) if target.mode == WatchMode::Native && err.is_recoverable() => {
            warn!(error = %err, "native file watching unavailable; falling back to polling");
            let fallback = WatchTarget {
                mode: WatchMode::Poll,
                ..target.clone()
            };
            Ok(ChangeDetector::from_target(&fallback, filter).spawn(rt_tx)?)
        }
        Err(err) => Err(err.into()),
    }
}

fn spawn_signal_handlers(tx: mpsc::Sender<RuntimeEvent>) {
    // Ctrl-C -> graceful shutdown; pressing it again while the child is
    // still stopping kills it.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                if tx.send(RuntimeEvent::ShutdownRequested).await.is_err() {
                    break;
                }
            }
        });
    }

    spawn_unix_signal_handlers(tx);
}

/// SIGTERM -> graceful shutdown (a repeat forces it), SIGHUP -> immediate
/// restart.
#[cfg(unix)]
fn spawn_unix_signal_handlers(tx: mpsc::Sender<RuntimeEvent>) {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            let tx = tx.clone();
            tokio::spawn(async move {
                while term.recv().await.is_some() {
                    if tx.send(RuntimeEvent::ShutdownRequested).await.is_err() {
                        break;
                    }
                }
            });
        }
        Err(e) => warn!(error = %e, "failed to listen for SIGTERM"),
    }

    match signal(SignalKind::hangup()) {
        Ok(mut hup) => {
            tokio::spawn(async move {
                while hup.recv().await.is_some() {
                    debug!("SIGHUP received");
                    if tx.send(RuntimeEvent::RestartRequested).await.is_err() {
                        break;
                    }
                }
            });
        }
        Err(e) => warn!(error = %e, "failed to listen for SIGHUP"),
    }
}

#[cfg(not(unix))]
fn spawn_unix_signal_handlers(_tx: mpsc::Sender<RuntimeEvent>) {}

/// Print the resolved settings without starting anything.
fn print_dry_run(settings: &Settings) {
    println!("watchserve dry-run");
    println!("  root = {}", settings.target.root.display());
    println!("  mode = {}", settings.target.mode);
    if settings.target.mode == WatchMode::Poll {
        println!("  poll_interval = {:?}", settings.target.poll_interval);
    }
    println!("  debounce = {:?}", settings.debounce);
    if let Some(max_wait) = settings.max_wait {
        println!("  max_wait = {max_wait:?}");
    }
    println!("  grace_period = {:?}", settings.grace_period);
    println!(
        "  crash_loop_threshold = {} (min_uptime = {:?})",
        settings.crash_loop_threshold, settings.min_uptime
    );
    println!();

    println!("command: {}", settings.command);
    if let Some(env_file) = &settings.env_file {
        println!("env_file: {}", env_file.display());
    }
    if !settings.include.is_empty() {
        println!("include: {:?}", settings.include);
    }
    println!("exclude ({}):", settings.exclude.len());
    for pattern in &settings.exclude {
        println!("  - {pattern}");
    }

    debug!("dry-run complete (nothing started)");
}
