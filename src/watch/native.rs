// src/watch/native.rs

//! Native (OS notification) change detector built on `notify`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::engine::RuntimeEvent;
use crate::errors::WatchError;
use crate::watch::event::{ChangeEvent, ChangeKind};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchFilter;

/// Path reported when events were lost and the whole root may have changed.
pub const RESCAN_PATH: &str = ".";

/// Translate one `notify` event into zero or more relevant changes.
///
/// Platform differences are flattened here:
/// - access events are dropped;
/// - renames become `Renamed` (both halves, when the backend reports both);
/// - anything other than a removal whose path is already gone is reported
///   as `Deleted`;
/// - paths outside the root, the root itself, and filtered paths are dropped;
/// - a rescan request (the OS dropped events, e.g. an inotify queue
///   overflow) becomes a single change to the root, since what changed is
///   unknown.
pub fn translate(root: &Path, filter: &WatchFilter, event: &Event, at: Instant) -> Vec<ChangeEvent> {
    if event.need_rescan() {
        warn!(?root, "file watcher lost events; treating the whole tree as changed");
        return vec![ChangeEvent {
            path: RESCAN_PATH.to_string(),
            kind: ChangeKind::Modified,
            at,
        }];
    }

    let base_kind = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
    };

    let mut changes = Vec::with_capacity(event.paths.len());
    for path in &event.paths {
        let Some(rel) = relative_str(root, path) else {
            trace!(?path, "event path outside watch root; ignoring");
            continue;
        };
        if !filter.is_relevant(&rel) {
            trace!(rel = %rel, "excluded path; ignoring");
            continue;
        }

        let kind = if base_kind != ChangeKind::Deleted && !path_exists(path) {
            ChangeKind::Deleted
        } else {
            base_kind
        };

        changes.push(ChangeEvent {
            path: rel,
            kind,
            at,
        });
    }
    changes
}

fn path_exists(path: &Path) -> bool {
    // symlink_metadata so a dangling symlink still counts as present.
    std::fs::symlink_metadata(path).is_ok()
}

/// Native detector bound to one watch root.
#[derive(Debug, Clone)]
pub struct NativeDetector {
    root: PathBuf,
    filter: WatchFilter,
}

/// Keeps the OS watcher alive alongside the task draining its events.
pub struct NativeHandle {
    pub(crate) watcher: RecommendedWatcher,
    pub(crate) task: JoinHandle<()>,
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle").finish_non_exhaustive()
    }
}

impl NativeDetector {
    pub fn new(root: impl Into<PathBuf>, filter: WatchFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    /// Subscribe to recursive notifications for the root and forward
    /// relevant changes to the runtime.
    pub fn spawn(
        self,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Result<NativeHandle, WatchError> {
        if !self.root.is_dir() {
            return Err(WatchError::RootMissing(self.root));
        }
        // Canonicalize once so we have a stable base path.
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());

        // Channel from the blocking notify callback into the async world.
        let (event_tx, mut event_rx) =
            mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Receiver gone means the detector was shut down.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        info!(?root, "native file watcher started");

        let filter = self.filter;
        let task = tokio::spawn(async move {
            while let Some(res) = event_rx.recv().await {
                let event = match res {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "file watch error; continuing");
                        if runtime_tx
                            .send(RuntimeEvent::WatchFailed(WatchError::Notify(err)))
                            .await
                            .is_err()
                        {
                            break;
                        }
                        continue;
                    }
                };

                trace!(?event, "received notify event");
                let changes = translate(&root, &filter, &event, Instant::now());
                if changes.is_empty() {
                    continue;
                }
                debug!(count = changes.len(), "native watcher detected changes");
                if runtime_tx.send(RuntimeEvent::Changes(changes)).await.is_err() {
                    break;
                }
            }
            debug!("native watcher event loop finished");
        });

        Ok(NativeHandle { watcher, task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, Flag, ModifyKind, RemoveKind, RenameMode};

    fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        let mut ev = Event::new(kind);
        ev.paths = paths;
        ev
    }

    fn filter() -> WatchFilter {
        WatchFilter::new(&[], &[".cache/*".to_string()]).unwrap()
    }

    #[test]
    fn maps_kinds_and_drops_access() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let app = root.join("app.py");
        std::fs::write(&app, "print()").unwrap();
        let now = Instant::now();

        let created = translate(&root, &filter(), &event(EventKind::Create(CreateKind::File), vec![app.clone()]), now);
        assert_eq!(created[0].kind, ChangeKind::Created);
        assert_eq!(created[0].path, "app.py");

        let modified = translate(
            &root,
            &filter(),
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), vec![app.clone()]),
            now,
        );
        assert_eq!(modified[0].kind, ChangeKind::Modified);

        let renamed = translate(
            &root,
            &filter(),
            &event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), vec![app.clone()]),
            now,
        );
        assert_eq!(renamed[0].kind, ChangeKind::Renamed);

        let accessed = translate(
            &root,
            &filter(),
            &event(EventKind::Access(notify::event::AccessKind::Any), vec![app]),
            now,
        );
        assert!(accessed.is_empty());
    }

    #[test]
    fn vanished_path_is_reported_as_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let ghost = root.join("ghost.py");

        let changes = translate(
            &root,
            &filter(),
            &event(EventKind::Modify(ModifyKind::Any), vec![ghost.clone()]),
            Instant::now(),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Deleted);

        let removed = translate(
            &root,
            &filter(),
            &event(EventKind::Remove(RemoveKind::File), vec![ghost]),
            Instant::now(),
        );
        assert_eq!(removed[0].kind, ChangeKind::Deleted);
    }

    #[test]
    fn lost_events_count_as_a_change_to_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let overflow = Event::new(EventKind::Other).set_flag(Flag::Rescan);
        assert!(overflow.need_rescan());

        // Even with an include list nothing would match.
        let py_only = WatchFilter::new(&["**/*.py".to_string()], &[]).unwrap();
        let changes = translate(&root, &py_only, &overflow, Instant::now());

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, RESCAN_PATH);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn excluded_and_foreign_paths_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let changes = translate(
            &root,
            &filter(),
            &event(
                EventKind::Create(CreateKind::File),
                vec![root.join(".cache/tmp"), PathBuf::from("/elsewhere/app.py"), root.clone()],
            ),
            Instant::now(),
        );
        assert!(changes.is_empty());
    }
}
