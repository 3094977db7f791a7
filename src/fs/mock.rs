// src/fs/mock.rs

//! In-memory [`FileSystem`] for exercising the polling detector without
//! touching disk, including the awkward cases: files that vanish between
//! listing and stat, and directories we are not allowed to read.

use super::{EntryKind, FileSystem, Fingerprint};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { modified: SystemTime, len: u64 },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    denied: Vec<PathBuf>,
    /// Logical clock used as mtime so every write is observably newer.
    clock: u64,
}

#[derive(Debug, Clone)]
pub struct MockFileSystem {
    root: PathBuf,
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut state = MockState::default();
        state.entries.insert(root.clone(), MockEntry::Dir(Vec::new()));
        Self {
            root,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create or overwrite a file (relative to the root), bumping its mtime.
    pub fn write(&self, rel: impl AsRef<Path>, content: impl AsRef<[u8]>) {
        let path = self.root.join(rel);
        let mut state = self.state.lock().unwrap();
        state.clock += 1;
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(state.clock);
        let len = content.as_ref().len() as u64;
        if let Some(parent) = path.parent() {
            Self::ensure_dir(&mut state, parent);
        }
        Self::link_child(&mut state, &path);
        state.entries.insert(path, MockEntry::File { modified, len });
    }

    /// Create an (empty) directory relative to the root.
    pub fn mkdir(&self, rel: impl AsRef<Path>) {
        let path = self.root.join(rel);
        let mut state = self.state.lock().unwrap();
        Self::ensure_dir(&mut state, &path);
    }

    /// Remove a file or a whole directory subtree.
    pub fn remove(&self, rel: impl AsRef<Path>) {
        let path = self.root.join(rel);
        let mut state = self.state.lock().unwrap();
        state.entries.retain(|p, _| !p.starts_with(&path));
        Self::unlink_child(&mut state, &path);
    }

    /// List `rel` in its parent directory without creating the entry, the
    /// way a file looks when it is deleted between `readdir` and `stat`.
    pub fn add_vanishing(&self, rel: impl AsRef<Path>) {
        let path = self.root.join(rel);
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = path.parent() {
            Self::ensure_dir(&mut state, parent);
        }
        Self::link_child(&mut state, &path);
    }

    /// Make reading the directory fail with `PermissionDenied`.
    pub fn deny(&self, rel: impl AsRef<Path>) {
        let path = self.root.join(rel);
        self.state.lock().unwrap().denied.push(path);
    }

    pub fn allow(&self, rel: impl AsRef<Path>) {
        let path = self.root.join(rel);
        self.state.lock().unwrap().denied.retain(|p| p != &path);
    }

    fn ensure_dir(state: &mut MockState, path: &Path) {
        if state.entries.contains_key(path) {
            return;
        }
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = path.parent() {
            if parent != path {
                Self::ensure_dir(state, parent);
                Self::link_child(state, path);
            }
        }
    }

    fn link_child(state: &mut MockState, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let name = name.to_string_lossy().into_owned();
        if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent) {
            if !children.contains(&name) {
                children.push(name);
            }
        }
    }

    fn unlink_child(state: &mut MockState, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let name = name.to_string_lossy();
        if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent) {
            children.retain(|c| c.as_str() != name.as_ref());
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {}", path.display()))
}

impl FileSystem for MockFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        if state.denied.iter().any(|d| d == path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            ));
        }
        match state.entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            Some(MockEntry::File { .. }) => Err(io::Error::other(format!(
                "not a directory: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        let state = self.state.lock().unwrap();
        match state.entries.get(path) {
            Some(MockEntry::Dir(_)) => Ok(EntryKind::Dir),
            Some(MockEntry::File { .. }) => Ok(EntryKind::File),
            None => Err(not_found(path)),
        }
    }

    fn fingerprint(&self, path: &Path) -> io::Result<Fingerprint> {
        let state = self.state.lock().unwrap();
        match state.entries.get(path) {
            Some(MockEntry::File { modified, len }) => Ok(Fingerprint {
                modified: Some(*modified),
                len: *len,
            }),
            Some(MockEntry::Dir(_)) => Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.entries.get(path), Some(MockEntry::Dir(_)))
    }
}
