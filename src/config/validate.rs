// src/config/validate.rs

//! File-level checks that need nothing but the parsed TOML.
//!
//! Checks that depend on the command line or the filesystem (root exists,
//! a command is present at all) happen in [`crate::config::settings`].

use crate::config::duration::parse_duration_field;
use crate::config::model::{ConfigFile, ProcessSection, WatchSection};
use crate::errors::{Result, WatchserveError};
use crate::watch::patterns::build_globset;

pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_patterns(&cfg.watch)?;
    validate_durations(cfg)?;
    validate_process(&cfg.process)?;
    Ok(())
}

/// Every pattern must compile here, so the matcher never sees a bad one.
pub fn validate_patterns(watch: &WatchSection) -> Result<()> {
    for (key, patterns) in [("watch.include", &watch.include), ("watch.exclude", &watch.exclude)] {
        build_globset(patterns)
            .map_err(|e| WatchserveError::config(format!("{key}: {e:#}")))?;
    }
    Ok(())
}

fn validate_durations(cfg: &ConfigFile) -> Result<()> {
    let fields = [
        ("watch.poll_interval", &cfg.watch.poll_interval),
        ("watch.debounce", &cfg.watch.debounce),
        ("watch.max_wait", &cfg.watch.max_wait),
        ("process.grace_period", &cfg.process.grace_period),
        ("process.min_uptime", &cfg.process.min_uptime),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            parse_duration_field(key, value)?;
        }
    }
    Ok(())
}

fn validate_process(process: &ProcessSection) -> Result<()> {
    if process.cmd.is_some() && process.program.is_some() {
        return Err(WatchserveError::config(
            "[process] sets both `cmd` and `program`; use one",
        ));
    }
    if process.program.is_none() && !process.args.is_empty() {
        return Err(WatchserveError::config(
            "[process].args requires [process].program",
        ));
    }
    if process.cmd.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(WatchserveError::config("[process].cmd is empty"));
    }
    if process.program.as_deref().is_some_and(|p| p.trim().is_empty()) {
        return Err(WatchserveError::config("[process].program is empty"));
    }
    if process.crash_loop_threshold == Some(0) {
        return Err(WatchserveError::config(
            "[process].crash_loop_threshold must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> ConfigFile {
        toml::from_str(toml_src).unwrap()
    }

    fn config_error(toml_src: &str) -> String {
        match validate_config(&parse(toml_src)) {
            Err(WatchserveError::ConfigError(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_typical_file() {
        let cfg = parse(
            r#"
            [watch]
            mode = "poll"
            poll_interval = "1s"
            debounce = "300ms"
            exclude = [".cache/*", "**/*.log"]

            [process]
            cmd = "uvicorn app:app --port 8000"
            env_file = ".env"
            "#,
        );
        validate_config(&cfg).unwrap();
        assert!(cfg.watch.default_excludes);
    }

    #[test]
    fn rejects_bad_glob() {
        let msg = config_error("[watch]\nexclude = [\"src/[\"]");
        assert!(msg.contains("watch.exclude"), "{msg}");
    }

    #[test]
    fn rejects_bad_duration() {
        let msg = config_error("[watch]\ndebounce = \"quick\"");
        assert!(msg.contains("watch.debounce"), "{msg}");
    }

    #[test]
    fn rejects_cmd_and_program_together() {
        config_error("[process]\ncmd = \"a\"\nprogram = \"b\"");
    }

    #[test]
    fn rejects_args_without_program_and_zero_threshold() {
        config_error("[process]\nargs = [\"--reload\"]");
        config_error("[process]\ncmd = \"a\"\ncrash_loop_threshold = 0");
    }

    #[test]
    fn rejects_unknown_mode_at_parse_time() {
        assert!(toml::from_str::<ConfigFile>("[watch]\nmode = \"inotify\"").is_err());
    }
}
