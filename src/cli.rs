// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::Overrides;
use crate::types::WatchMode;

/// Command-line arguments for `watchserve`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchserve",
    version,
    about = "Run a dev server and restart it when source files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Watchserve.toml` in the current working directory, if it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to watch (default: the config file's directory).
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Change detection strategy.
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<WatchMode>,

    /// Rescan interval in poll mode (e.g. "1s", "500ms").
    #[arg(long, value_name = "DURATION")]
    pub poll_interval: Option<String>,

    /// Quiet period before restarting (e.g. "300ms").
    #[arg(long, value_name = "DURATION")]
    pub debounce: Option<String>,

    /// Restart after this long even if changes keep coming.
    #[arg(long, value_name = "DURATION")]
    pub max_wait: Option<String>,

    /// Extra exclusion glob (repeatable).
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Only changes matching these globs count (repeatable).
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Don't exclude VCS, virtualenv and cache directories by default.
    #[arg(long)]
    pub no_default_excludes: bool,

    /// Env file whose entries are added to the child's environment.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Time between SIGTERM and SIGKILL when stopping the child.
    #[arg(long, value_name = "DURATION")]
    pub grace_period: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHSERVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print settings, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command to serve, e.g. `-- uvicorn app:app --port 8000`.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl CliArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            root: self.root.clone(),
            mode: self.mode,
            poll_interval: self.poll_interval.clone(),
            debounce: self.debounce.clone(),
            max_wait: self.max_wait.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            no_default_excludes: self.no_default_excludes,
            env_file: self.env_file.clone(),
            grace_period: self.grace_period.clone(),
            command: self.command.clone(),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
