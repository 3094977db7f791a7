// src/process/mod.rs

//! Served-process management.
//!
//! - [`backend`] abstracts how a process is launched and signalled.
//! - [`controller`] owns the single child slot and its lifecycle.

pub mod backend;
pub mod controller;

pub use backend::{BoxFuture, ChildProcess, CommandSpec, ExitInfo, ProcessBackend, TokioBackend};
pub use controller::{ChildController, ChildInfo, ChildState, ExitReport, StopOutcome};
