//! Domain types for Quimera
//!
//! - Session: immutable description of one exploit search
//! - IterationState: record threaded through the loop, replaced each iteration
//! - Outcome: verdict derived from a sandbox trace
//! - Chain: per-chain constants for the generated test contract

pub mod chains;
pub mod outcome;
pub mod session;
pub mod state;

pub use chains::{Chain, ChainAddresses};
pub use outcome::{ENTRY_POINT, Outcome, classify, failure_reason};
pub use session::{
    Environment, GenerationSpec, Session, SessionArgs, TargetRef, check_required_binaries, normalize_address,
    project_root,
};
pub use state::IterationState;
