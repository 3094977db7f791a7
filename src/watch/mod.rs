// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling exclusion / inclusion glob patterns.
//! - Detecting changes under the watch root, either through native OS
//!   notifications (`notify`) or by polling and diffing snapshots.
//! - Normalizing both into [`ChangeEvent`]s and filtering them before they
//!   leave the detector.
//!
//! It does **not** know about the child process; it only turns filesystem
//! changes into `RuntimeEvent::Changes`.

pub mod detector;
pub mod event;
pub mod native;
pub mod path_utils;
pub mod patterns;
pub mod poll;

pub use detector::{ChangeDetector, DetectorHandle, WatchTarget};
pub use event::{ChangeEvent, ChangeKind};
pub use patterns::{default_excludes, matches, ExclusionSet, WatchFilter};
