//! Coordination between the supervisor and worker processes
//!
//! The only shared state is the cancellation signal.

pub mod cancel;

pub use cancel::CancellationSignal;
