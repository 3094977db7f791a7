// src/fs/mod.rs

//! Filesystem seam used by the polling detector.
//!
//! The trait returns raw `io::Result`s so callers can tell "vanished" apart
//! from "not allowed to look".

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub mod mock;

/// What the polling detector records per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

/// Kind of a directory entry, without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, sockets, fifos. Symlinks are fingerprinted by their target
    /// when it is a file; directory symlinks are never descended into.
    Other,
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Return the full paths of the entries in a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Entry kind without following symlinks.
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// Modification time and size of a file (follows symlinks).
    fn fingerprint(&self, path: &Path) -> io::Result<Fingerprint>;

    fn is_dir(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            match entry {
                Ok(entry) => entries.push(entry.path()),
                // Entry removed while iterating.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        let ft = fs::symlink_metadata(path)?.file_type();
        Ok(if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        })
    }

    fn fingerprint(&self, path: &Path) -> io::Result<Fingerprint> {
        let meta = fs::metadata(path)?;
        Ok(Fingerprint {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}
