//! Quimera - iterative exploit synthesis.
//!
//! A session renders a Foundry test around a candidate exploit, runs it
//! against a forked chain, and feeds the trace back to a generation backend
//! (a model or a human operator) until the test passes or the budget runs
//! out. The session runs in a worker process; a supervisor process owns the
//! terminal monitor and relays cancellation.

pub mod analyzer;
pub mod artifact;
pub mod backend;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod ipc;
pub mod llm;
pub mod prompt;
pub mod runner;
pub mod sandbox;
pub mod storage;
pub mod supervisor;
pub mod tui;

pub use error::{QuimeraError, Result};
