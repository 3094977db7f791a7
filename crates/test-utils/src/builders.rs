#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use watchserve::config::Settings;
use watchserve::process::CommandSpec;
use watchserve::types::WatchMode;
use watchserve::watch::{default_excludes, WatchTarget};

/// Builder for `Settings` with test-friendly defaults: poll mode, short
/// intervals, no default exclusions, and a placeholder shell command.
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            settings: Settings {
                target: WatchTarget {
                    root: root.as_ref().to_path_buf(),
                    mode: WatchMode::Poll,
                    poll_interval: Duration::from_millis(50),
                },
                include: Vec::new(),
                exclude: Vec::new(),
                debounce: Duration::from_millis(100),
                max_wait: None,
                command: CommandSpec::Shell("serve".to_string()),
                env_file: None,
                grace_period: Duration::from_secs(1),
                crash_loop_threshold: 3,
                min_uptime: Duration::from_secs(2),
            },
        }
    }

    pub fn mode(mut self, mode: WatchMode) -> Self {
        self.settings.target.mode = mode;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.settings.target.poll_interval = interval;
        self
    }

    pub fn debounce(mut self, quiet: Duration) -> Self {
        self.settings.debounce = quiet;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.settings.max_wait = Some(max_wait);
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.settings.exclude.push(pattern.to_string());
        self
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.settings.include.push(pattern.to_string());
        self
    }

    pub fn with_default_excludes(mut self) -> Self {
        let mut patterns = default_excludes();
        patterns.append(&mut self.settings.exclude);
        self.settings.exclude = patterns;
        self
    }

    pub fn shell(mut self, cmd: &str) -> Self {
        self.settings.command = CommandSpec::Shell(cmd.to_string());
        self
    }

    pub fn argv(mut self, program: &str, args: &[&str]) -> Self {
        self.settings.command = CommandSpec::Argv {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.env_file = Some(path.into());
        self
    }

    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.settings.grace_period = grace;
        self
    }

    pub fn crash_loop(mut self, threshold: u32, min_uptime: Duration) -> Self {
        self.settings.crash_loop_threshold = threshold;
        self.settings.min_uptime = min_uptime;
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}
