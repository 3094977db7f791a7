// src/watch/detector.rs

//! The change detector capability, selected once at startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::RuntimeEvent;
use crate::errors::WatchError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::WatchMode;
use crate::watch::native::{NativeDetector, NativeHandle};
use crate::watch::patterns::WatchFilter;
use crate::watch::poll::PollDetector;

/// Root directory to monitor and how to monitor it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub root: PathBuf,
    pub mode: WatchMode,
    /// Only used in [`WatchMode::Poll`].
    pub poll_interval: Duration,
}

/// Either detector variant. Both filter through the same [`WatchFilter`]
/// before anything leaves them, so excluded churn never reaches the
/// debouncer.
#[derive(Debug, Clone)]
pub enum ChangeDetector {
    Poll(PollDetector),
    Native(NativeDetector),
}

impl ChangeDetector {
    pub fn from_target(target: &WatchTarget, filter: WatchFilter) -> Self {
        Self::with_fs(target, filter, Arc::new(RealFileSystem))
    }

    /// Like [`from_target`](Self::from_target) with an explicit filesystem
    /// for the polling variant.
    pub fn with_fs(target: &WatchTarget, filter: WatchFilter, fs: Arc<dyn FileSystem>) -> Self {
        match target.mode {
            WatchMode::Poll => ChangeDetector::Poll(PollDetector::new(
                fs,
                target.root.clone(),
                filter,
                target.poll_interval,
            )),
            WatchMode::Native => {
                ChangeDetector::Native(NativeDetector::new(target.root.clone(), filter))
            }
        }
    }

    /// Start the background watch activity.
    pub fn spawn(self, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Result<DetectorHandle, WatchError> {
        match self {
            ChangeDetector::Poll(poll) => Ok(DetectorHandle {
                task: poll.spawn(runtime_tx),
                native: None,
            }),
            ChangeDetector::Native(native) => {
                let NativeHandle { watcher, task } = native.spawn(runtime_tx)?;
                Ok(DetectorHandle {
                    task,
                    native: Some(watcher),
                })
            }
        }
    }
}

/// Running detector. Dropping it stops watching.
pub struct DetectorHandle {
    task: JoinHandle<()>,
    native: Option<notify::RecommendedWatcher>,
}

impl DetectorHandle {
    /// Stop watching now.
    pub fn shutdown(mut self) {
        self.native.take();
        self.task.abort();
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("native", &self.native.is_some())
            .finish_non_exhaustive()
    }
}
