// src/config/mod.rs

//! Configuration loading and validation for watchserve.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate file-level invariants like globs and durations (`validate.rs`).
//! - Merge the file with command-line overrides into [`Settings`]
//!   (`settings.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{discover, load_and_validate, load_from_path, LoadedConfig};
pub use model::{ConfigFile, ProcessSection, WatchSection};
pub use settings::{Overrides, Settings};
pub use validate::validate_config;
