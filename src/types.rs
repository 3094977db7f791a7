// src/types.rs

//! Small shared value types.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// How the change detector learns about filesystem changes.
///
/// - `Native`: subscribe to OS notifications (inotify, FSEvents, ...).
/// - `Poll`: rescan the watch root on a fixed interval and diff snapshots.
///   Slower, but works on network mounts and inside VMs where native
///   notifications are missing or unreliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Native,
    Poll,
}

impl Default for WatchMode {
    fn default() -> Self {
        WatchMode::Native
    }
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMode::Native => f.write_str("native"),
            WatchMode::Poll => f.write_str("poll"),
        }
    }
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(WatchMode::Native),
            "poll" | "polling" => Ok(WatchMode::Poll),
            other => Err(format!(
                "invalid watch mode: {other} (expected \"native\" or \"poll\")"
            )),
        }
    }
}
