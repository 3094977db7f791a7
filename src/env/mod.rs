// src/env/mod.rs

//! Env-file loading for the served process.
//!
//! Entries are parsed with `dotenvy` but never exported into the
//! supervisor's own environment; they are handed to the process backend,
//! which layers them over the inherited environment.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, WatchserveError};

/// Parse a dotenv-style file into ordered `(key, value)` pairs.
pub fn load_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| WatchserveError::EnvFile(format!("{}: {e}", path.display())))?;

    let mut entries = Vec::new();
    for item in iter {
        let (key, value) =
            item.map_err(|e| WatchserveError::EnvFile(format!("{}: {e}", path.display())))?;
        entries.push((key, value));
    }
    debug!(path = %path.display(), count = entries.len(), "loaded env file");
    Ok(entries)
}

/// Where the child's extra environment comes from.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    path: Option<PathBuf>,
    last_good: Vec<(String, String)>,
}

impl EnvSource {
    /// No extra environment.
    pub fn none() -> Self {
        Self::default()
    }

    /// Fixed entries that are never re-read.
    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        Self {
            path: None,
            last_good: entries,
        }
    }

    /// Load `path` now; it is re-read on every later [`load`](Self::load).
    ///
    /// Failing here is fatal to startup.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let last_good = load_env_file(&path)?;
        Ok(Self {
            path: Some(path),
            last_good,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current entries. A file that stopped parsing keeps the previous
    /// entries in effect.
    pub fn load(&mut self) -> &[(String, String)] {
        if let Some(path) = &self.path {
            match load_env_file(path) {
                Ok(entries) => self.last_good = entries,
                Err(err) => {
                    warn!(error = %err, "env file reload failed; reusing previous entries")
                }
            }
        }
        &self.last_good
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_comments_quotes_and_export() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# database").unwrap();
        writeln!(file, "DATABASE_URL=postgres://localhost/dev").unwrap();
        writeln!(file, "GREETING=\"hello world\"").unwrap();
        writeln!(file, "export DEBUG=1").unwrap();

        let entries = load_env_file(file.path()).unwrap();
        assert_eq!(
            entries,
            vec![
                ("DATABASE_URL".to_string(), "postgres://localhost/dev".to_string()),
                ("GREETING".to_string(), "hello world".to_string()),
                ("DEBUG".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn missing_file_is_an_env_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_env_file(&dir.path().join("nope.env")).unwrap_err();
        assert!(matches!(err, WatchserveError::EnvFile(_)));
    }

    #[test]
    fn reload_picks_up_edits_and_survives_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "PORT=8000\n").unwrap();

        let mut source = EnvSource::from_file(&path).unwrap();
        assert_eq!(source.load(), &[("PORT".to_string(), "8000".to_string())]);

        std::fs::write(&path, "PORT=9000\n").unwrap();
        assert_eq!(source.load(), &[("PORT".to_string(), "9000".to_string())]);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(source.load(), &[("PORT".to_string(), "9000".to_string())]);
    }

    #[test]
    fn fixed_entries_are_returned_as_is() {
        let mut source = EnvSource::from_entries(vec![("A".into(), "1".into())]);
        assert!(source.path().is_none());
        assert_eq!(source.load().len(), 1);
        assert!(EnvSource::none().load().is_empty());
    }
}
