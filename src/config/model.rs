// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::WatchMode;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// root = "."
/// mode = "poll"
/// poll_interval = "1s"
/// debounce = "300ms"
/// exclude = [".cache/*"]
///
/// [process]
/// cmd = "uvicorn app:app --port 8000"
/// env_file = ".env"
/// ```
///
/// Both sections are optional; command-line flags fill in or override
/// anything left out.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub process: ProcessSection,
}

/// `[watch]` section.
///
/// Durations stay strings here (e.g. `"250ms"`, `"1s"`) and are parsed
/// during validation so errors can name the offending key.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Watch root, relative to the directory holding the config file.
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub mode: Option<WatchMode>,

    /// Rescan interval; only used in `poll` mode.
    #[serde(default)]
    pub poll_interval: Option<String>,

    /// Quiet period before a burst of changes restarts the process.
    #[serde(default)]
    pub debounce: Option<String>,

    /// Upper bound on how long a continuous burst can postpone a restart.
    #[serde(default)]
    pub max_wait: Option<String>,

    /// If non-empty, only matching paths count as changes.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Prepend the built-in exclusions (VCS, virtualenvs, caches).
    #[serde(default = "default_true")]
    pub default_excludes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            root: None,
            mode: None,
            poll_interval: None,
            debounce: None,
            max_wait: None,
            include: Vec::new(),
            exclude: Vec::new(),
            default_excludes: default_true(),
        }
    }
}

/// `[process]` section.
///
/// Exactly one of `cmd` (run through the shell) or `program` + `args`
/// (executed directly) may be given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessSection {
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Dotenv-style file merged into the child environment on every start.
    #[serde(default)]
    pub env_file: Option<PathBuf>,

    /// How long to wait after SIGTERM before SIGKILL.
    #[serde(default)]
    pub grace_period: Option<String>,

    #[serde(default)]
    pub crash_loop_threshold: Option<u32>,

    /// Exits sooner than this after start count towards a crash loop.
    #[serde(default)]
    pub min_uptime: Option<String>,
}
