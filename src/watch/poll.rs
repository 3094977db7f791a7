// src/watch/poll.rs

//! Polling change detector.
//!
//! Every tick we walk the watch root, record `(mtime, size)` per relevant
//! file and diff the new snapshot against the previous one. Cost grows with
//! the size of the tree, which is the price for working on filesystems
//! where native notifications don't.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::WatchError;
use crate::fs::{EntryKind, FileSystem, Fingerprint};
use crate::watch::event::{ChangeEvent, ChangeKind};
use crate::watch::path_utils::normalize;
use crate::watch::patterns::WatchFilter;

/// Relative path -> fingerprint for every relevant file under the root.
pub type Snapshot = BTreeMap<String, Fingerprint>;

/// Result of one walk over the tree.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub snapshot: Snapshot,
    /// Directories (or files) we could not inspect. Their previous entries
    /// are carried over into `snapshot`.
    pub errors: Vec<WatchError>,
}

/// Walk `root` and fingerprint every relevant file.
///
/// - Excluded directories are not descended into.
/// - Directory symlinks are not followed.
/// - Entries that disappear mid-walk are left out (they show up as deleted
///   in the diff if we knew about them).
/// - Unreadable directories keep whatever `previous` recorded beneath them.
pub fn scan(
    fs: &dyn FileSystem,
    root: &Path,
    filter: &WatchFilter,
    previous: Option<&Snapshot>,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                carry_over(previous, &rel_of(root, &dir), &mut outcome.snapshot);
                outcome.errors.push(WatchError::Inaccessible {
                    path: dir,
                    source: e,
                });
                continue;
            }
        };

        for path in entries {
            let rel = rel_of(root, &path);
            if rel.is_empty() || filter.is_excluded(&rel) {
                continue;
            }

            let kind = match fs.entry_kind(&path) {
                Ok(kind) => kind,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    carry_over(previous, &rel, &mut outcome.snapshot);
                    outcome.errors.push(WatchError::Inaccessible { path, source: e });
                    continue;
                }
            };

            match kind {
                EntryKind::Dir => stack.push(path),
                EntryKind::Other if fs.is_dir(&path) => {
                    // Symlink to a directory.
                }
                EntryKind::File | EntryKind::Other => {
                    if !filter.is_relevant(&rel) {
                        continue;
                    }
                    match fs.fingerprint(&path) {
                        Ok(fp) => {
                            outcome.snapshot.insert(rel, fp);
                        }
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => {
                            carry_over(previous, &rel, &mut outcome.snapshot);
                            outcome.errors.push(WatchError::Inaccessible { path, source: e });
                        }
                    }
                }
            }
        }
    }

    outcome
}

/// Classify every difference between two snapshots.
pub fn diff(old: &Snapshot, new: &Snapshot, at: Instant) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();

    for (path, fp) in new {
        let kind = match old.get(path) {
            None => ChangeKind::Created,
            Some(old_fp) if old_fp != fp => ChangeKind::Modified,
            Some(_) => continue,
        };
        changes.push(ChangeEvent {
            path: path.clone(),
            kind,
            at,
        });
    }

    for path in old.keys() {
        if !new.contains_key(path) {
            changes.push(ChangeEvent {
                path: path.clone(),
                kind: ChangeKind::Deleted,
                at,
            });
        }
    }

    changes
}

/// Copy entries at or below `rel_prefix` from the previous snapshot.
fn carry_over(previous: Option<&Snapshot>, rel_prefix: &str, into: &mut Snapshot) {
    let Some(previous) = previous else {
        return;
    };
    let dir_prefix = format!("{rel_prefix}/");
    for (path, fp) in previous {
        if rel_prefix.is_empty() || path == rel_prefix || path.starts_with(&dir_prefix) {
            into.insert(path.clone(), *fp);
        }
    }
}

fn rel_of(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).map(normalize).unwrap_or_default()
}

enum ScanStep {
    Done(Snapshot),
    /// The scan itself panicked; keep the previous snapshot.
    Failed,
    /// Nobody is listening any more.
    Closed,
}

/// Polling detector bound to one watch root.
#[derive(Debug, Clone)]
pub struct PollDetector {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    filter: WatchFilter,
    interval: Duration,
}

impl PollDetector {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        filter: WatchFilter,
        interval: Duration,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            filter,
            interval,
        }
    }

    /// Start polling in the background. The first scan is the baseline and
    /// reports nothing. The task ends when `runtime_tx` is closed or the
    /// handle is aborted.
    pub fn spawn(self, runtime_tx: mpsc::Sender<RuntimeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                root = ?self.root,
                interval_ms = self.interval.as_millis() as u64,
                "polling watcher started"
            );

            let mut reported: HashSet<PathBuf> = HashSet::new();
            let mut snapshot = match self.scan_blocking(None, &runtime_tx, &mut reported).await {
                ScanStep::Done(snapshot) => snapshot,
                ScanStep::Failed => Snapshot::new(),
                ScanStep::Closed => return,
            };
            debug!(files = snapshot.len(), "baseline snapshot taken");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let next = match self
                    .scan_blocking(Some(snapshot.clone()), &runtime_tx, &mut reported)
                    .await
                {
                    ScanStep::Done(next) => next,
                    ScanStep::Failed => continue,
                    ScanStep::Closed => break,
                };

                let changes = diff(&snapshot, &next, Instant::now());
                snapshot = next;

                if changes.is_empty() {
                    continue;
                }
                debug!(count = changes.len(), "poll detected changes");
                if runtime_tx.send(RuntimeEvent::Changes(changes)).await.is_err() {
                    break;
                }
            }

            debug!("polling watcher finished (runtime channel closed)");
        })
    }

    /// Run one scan on the blocking pool and forward newly seen errors.
    async fn scan_blocking(
        &self,
        previous: Option<Snapshot>,
        runtime_tx: &mpsc::Sender<RuntimeEvent>,
        reported: &mut HashSet<PathBuf>,
    ) -> ScanStep {
        let fs = Arc::clone(&self.fs);
        let root = self.root.clone();
        let filter = self.filter.clone();

        let outcome = match tokio::task::spawn_blocking(move || {
            scan(fs.as_ref(), &root, &filter, previous.as_ref())
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "polling scan task failed");
                return ScanStep::Failed;
            }
        };

        // Only surface an unreadable path once until it recovers.
        let failing: HashSet<PathBuf> = outcome
            .errors
            .iter()
            .filter_map(|e| e.path().map(Path::to_path_buf))
            .collect();
        reported.retain(|p| failing.contains(p));

        for err in outcome.errors {
            let Some(path) = err.path().map(Path::to_path_buf) else {
                continue;
            };
            if !reported.insert(path) {
                continue;
            }
            warn!(error = %err, "polling watcher could not inspect path; continuing");
            if runtime_tx.send(RuntimeEvent::WatchFailed(err)).await.is_err() {
                return ScanStep::Closed;
            }
        }

        if runtime_tx.is_closed() {
            ScanStep::Closed
        } else {
            ScanStep::Done(outcome.snapshot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn filter(exclude: &[&str]) -> WatchFilter {
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        WatchFilter::new(&[], &exclude).unwrap()
    }

    fn kinds(changes: &[ChangeEvent]) -> Vec<(String, ChangeKind)> {
        changes.iter().map(|c| (c.path.clone(), c.kind)).collect()
    }

    #[test]
    fn diff_classifies_created_modified_deleted() {
        let fs = MockFileSystem::new("/p");
        fs.write("keep.py", "a");
        fs.write("edit.py", "a");
        fs.write("drop.py", "a");
        let f = filter(&[]);
        let before = scan(&fs, fs.root(), &f, None).snapshot;

        fs.write("edit.py", "ab");
        fs.remove("drop.py");
        fs.write("new.py", "x");
        let after = scan(&fs, fs.root(), &f, Some(&before)).snapshot;

        assert_eq!(
            kinds(&diff(&before, &after, Instant::now())),
            vec![
                ("edit.py".to_string(), ChangeKind::Modified),
                ("new.py".to_string(), ChangeKind::Created),
                ("drop.py".to_string(), ChangeKind::Deleted),
            ]
        );
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let fs = MockFileSystem::new("/p");
        fs.write("app.py", "a");
        fs.write(".cache/tmp", "a");
        fs.write(".git/objects/ab/cd", "a");
        let snap = scan(&fs, fs.root(), &filter(&[".cache/*", "**/.git"]), None).snapshot;
        assert_eq!(snap.keys().cloned().collect::<Vec<_>>(), vec!["app.py"]);
    }

    #[test]
    fn file_vanishing_between_listing_and_stat_is_not_an_error() {
        let fs = MockFileSystem::new("/p");
        fs.write("app.py", "a");
        fs.add_vanishing("gone.py");
        let outcome = scan(&fs, fs.root(), &filter(&[]), None);
        assert!(outcome.errors.is_empty());
        assert!(outcome.snapshot.contains_key("app.py"));
        assert!(!outcome.snapshot.contains_key("gone.py"));
    }

    #[test]
    fn deleted_then_recreated_between_scans_is_a_modification_or_noop() {
        let fs = MockFileSystem::new("/p");
        fs.write("app.py", "a");
        let f = filter(&[]);
        let before = scan(&fs, fs.root(), &f, None).snapshot;

        fs.remove("app.py");
        fs.write("app.py", "a");
        let after = scan(&fs, fs.root(), &f, Some(&before)).snapshot;

        let changes = diff(&before, &after, Instant::now());
        assert!(changes.iter().all(|c| c.path == "app.py"));
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Modified));
    }

    #[test]
    fn unreadable_directory_keeps_previous_entries() {
        let fs = MockFileSystem::new("/p");
        fs.write("app.py", "a");
        fs.write("private/secret.py", "a");
        let f = filter(&[]);
        let before = scan(&fs, fs.root(), &f, None).snapshot;

        fs.deny("private");
        fs.write("app.py", "ab");
        let outcome = scan(&fs, fs.root(), &f, Some(&before));

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].is_recoverable());
        let changes = diff(&before, &outcome.snapshot, Instant::now());
        assert_eq!(
            kinds(&changes),
            vec![("app.py".to_string(), ChangeKind::Modified)]
        );
    }
}
