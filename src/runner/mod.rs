//! Session runner - the iteration state machine and its worker bootstrap.
//!
//! This module provides:
//! - SessionController, generic over the analyzer and sandbox runner
//! - SessionOutcome for how a session ended
//! - Worker wiring from a `Session` and `Config`

mod controller;
mod worker;

pub use controller::{SessionController, SessionOutcome};
pub use worker::{SharedAnalyzer, WorkerController, build_controller, preflight, report, run_worker};
