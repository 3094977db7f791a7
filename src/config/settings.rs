// src/config/settings.rs

//! Resolved, validated settings: config file and command line merged.
//!
//! Command-line values win over the file, the file wins over defaults.
//! Paths from the file resolve against the file's directory; paths from
//! the command line resolve against the working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::duration::parse_duration_field;
use crate::config::model::ConfigFile;
use crate::engine::CoreOptions;
use crate::errors::{Result, WatchError, WatchserveError};
use crate::process::CommandSpec;
use crate::types::WatchMode;
use crate::watch::{default_excludes, WatchFilter, WatchTarget};

pub const DEFAULT_POLL_INTERVAL: &str = "1s";
pub const DEFAULT_DEBOUNCE: &str = "300ms";
pub const DEFAULT_GRACE_PERIOD: &str = "5s";
pub const DEFAULT_MIN_UPTIME: &str = "2s";
pub const DEFAULT_CRASH_LOOP_THRESHOLD: u32 = 3;

/// Command-line values layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub mode: Option<WatchMode>,
    pub poll_interval: Option<String>,
    pub debounce: Option<String>,
    pub max_wait: Option<String>,
    /// Appended to the file's patterns.
    pub include: Vec<String>,
    /// Appended to the file's patterns.
    pub exclude: Vec<String>,
    pub no_default_excludes: bool,
    pub env_file: Option<PathBuf>,
    pub grace_period: Option<String>,
    /// Program and arguments; replaces `[process]` when non-empty.
    pub command: Vec<String>,
}

/// Everything the supervisor needs, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub target: WatchTarget,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub debounce: Duration,
    pub max_wait: Option<Duration>,
    pub command: CommandSpec,
    pub env_file: Option<PathBuf>,
    pub grace_period: Duration,
    pub crash_loop_threshold: u32,
    pub min_uptime: Duration,
}

impl Settings {
    pub fn resolve(cfg: &ConfigFile, base_dir: &Path, overrides: &Overrides) -> Result<Self> {
        let watch = &cfg.watch;
        let process = &cfg.process;

        let root = match (&overrides.root, &watch.root) {
            (Some(root), _) => root.clone(),
            (None, Some(root)) => base_dir.join(root),
            (None, None) => base_dir.to_path_buf(),
        };
        if !root.is_dir() {
            return Err(WatchError::RootMissing(root).into());
        }

        let mode = overrides.mode.or(watch.mode).unwrap_or_default();

        let poll_interval = duration(
            "poll_interval",
            overrides.poll_interval.as_deref(),
            watch.poll_interval.as_deref(),
            DEFAULT_POLL_INTERVAL,
        )?;
        let debounce = duration(
            "debounce",
            overrides.debounce.as_deref(),
            watch.debounce.as_deref(),
            DEFAULT_DEBOUNCE,
        )?;
        let grace_period = duration(
            "grace_period",
            overrides.grace_period.as_deref(),
            process.grace_period.as_deref(),
            DEFAULT_GRACE_PERIOD,
        )?;
        let min_uptime = duration(
            "min_uptime",
            None,
            process.min_uptime.as_deref(),
            DEFAULT_MIN_UPTIME,
        )?;
        for (key, value) in [
            ("poll_interval", poll_interval),
            ("debounce", debounce),
            ("grace_period", grace_period),
        ] {
            if value.is_zero() {
                return Err(WatchserveError::config(format!("{key} must be greater than zero")));
            }
        }

        let max_wait = match overrides.max_wait.as_deref().or(watch.max_wait.as_deref()) {
            Some(value) => Some(parse_duration_field("max_wait", value)?),
            None => None,
        };
        if let Some(max_wait) = max_wait.filter(|m| *m < debounce) {
            return Err(WatchserveError::config(format!(
                "max_wait ({max_wait:?}) must not be shorter than debounce ({debounce:?})"
            )));
        }

        let mut exclude = Vec::new();
        if watch.default_excludes && !overrides.no_default_excludes {
            exclude.extend(default_excludes());
        }
        exclude.extend(watch.exclude.iter().cloned());
        exclude.extend(overrides.exclude.iter().cloned());

        let mut include = watch.include.clone();
        include.extend(overrides.include.iter().cloned());

        // Compile once here so bad patterns fail at startup.
        WatchFilter::new(&include, &exclude)
            .map_err(|e| WatchserveError::config(format!("{e:#}")))?;

        let command = resolve_command(cfg, &overrides.command)?;

        let env_file = match (&overrides.env_file, &process.env_file) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(path)) => Some(base_dir.join(path)),
            (None, None) => None,
        };
        if let Some(path) = env_file.as_ref().filter(|p| !p.is_file()) {
            return Err(WatchserveError::config(format!(
                "env file not found: {}",
                path.display()
            )));
        }

        let crash_loop_threshold = process
            .crash_loop_threshold
            .unwrap_or(DEFAULT_CRASH_LOOP_THRESHOLD);
        if crash_loop_threshold == 0 {
            return Err(WatchserveError::config("crash_loop_threshold must be >= 1"));
        }

        Ok(Self {
            target: WatchTarget {
                root,
                mode,
                poll_interval,
            },
            include,
            exclude,
            debounce,
            max_wait,
            command,
            env_file,
            grace_period,
            crash_loop_threshold,
            min_uptime,
        })
    }

    /// Compiled include/exclude filter shared by both detectors.
    pub fn watch_filter(&self) -> Result<WatchFilter> {
        WatchFilter::new(&self.include, &self.exclude)
            .map_err(|e| WatchserveError::config(format!("{e:#}")))
    }

    pub fn core_options(&self) -> CoreOptions {
        CoreOptions {
            debounce: self.debounce,
            max_wait: self.max_wait,
            crash_loop_threshold: self.crash_loop_threshold,
            min_uptime: self.min_uptime,
        }
    }
}

fn duration(key: &str, flag: Option<&str>, file: Option<&str>, default: &str) -> Result<Duration> {
    parse_duration_field(key, flag.or(file).unwrap_or(default))
}

fn resolve_command(cfg: &ConfigFile, cli_command: &[String]) -> Result<CommandSpec> {
    let command = match cli_command.split_first() {
        Some((program, args)) => CommandSpec::Argv {
            program: program.clone(),
            args: args.to_vec(),
        },
        None => match (&cfg.process.cmd, &cfg.process.program) {
            (Some(_), Some(_)) => {
                return Err(WatchserveError::config(
                    "[process] sets both `cmd` and `program`; use one",
                ));
            }
            (Some(cmd), None) => CommandSpec::Shell(cmd.clone()),
            (None, Some(program)) => CommandSpec::Argv {
                program: program.clone(),
                args: cfg.process.args.clone(),
            },
            (None, None) => {
                return Err(WatchserveError::config(
                    "no command to run: set [process].cmd or pass one after `--`",
                ));
            }
        },
    };

    if command.is_empty() {
        return Err(WatchserveError::config("the command to run is empty"));
    }
    Ok(command)
}
