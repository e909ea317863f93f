//! Iteration log persistence.
//!
//! Every iteration of a session leaves a directory holding the prompt that was
//! sent, the response that came back (absent for iteration 0), and the time
//! the record was written. Records are only ever appended.

mod iteration;

pub use iteration::{IterationLog, IterationRecord, PROMPT_FILE, RESPONSE_FILE, TIMESTAMP_FILE};
