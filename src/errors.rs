// src/errors.rs

//! Crate-wide error types.
//!
//! - [`WatchserveError`] is what the public entry points return.
//! - [`LaunchError`] is fatal to the supervisor: the served process could not
//!   be started at all.
//! - [`WatchError`] is recoverable: it is logged and watching continues.
//! - [`ChildCrash`] is never returned as `Err`; it is a value the supervisor
//!   reports when the child dies on its own.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::process::ExitInfo;

#[derive(Error, Debug)]
pub enum WatchserveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Environment file error: {0}")]
    EnvFile(String),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchserveError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// The served process could not be launched.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("launch command is empty")]
    EmptyCommand,

    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("permission denied launching {program}")]
    PermissionDenied { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// `start()` was called while a previous child is not yet confirmed
    /// stopped.
    #[error("a child process is already running (pid {})", display_pid(.pid))]
    AlreadyRunning { pid: Option<u32> },
}

impl LaunchError {
    /// Classify a spawn failure by its `io::ErrorKind`.
    pub fn from_spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        let program = program.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { program },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { program },
            _ => Self::Spawn { program, source },
        }
    }
}

/// Problems observed while watching the filesystem.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watch root does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

impl WatchError {
    /// Whether watching can continue after this error.
    ///
    /// Only a missing root is fatal, and that is caught at configuration
    /// time; everything reported while running is recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::RootMissing(_))
    }

    /// The path this error is about, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::RootMissing(path) | Self::Inaccessible { path, .. } => Some(path),
            Self::Notify(_) => None,
        }
    }
}

/// The served process exited with a failure status outside a
/// supervisor-initiated stop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("child process (pid {}) crashed: {exit}", display_pid(.pid))]
pub struct ChildCrash {
    pub pid: Option<u32>,
    pub exit: ExitInfo,
}

fn display_pid(pid: &Option<u32>) -> impl fmt::Display {
    match pid {
        Some(pid) => pid.to_string(),
        None => "unknown".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchserveError>;
