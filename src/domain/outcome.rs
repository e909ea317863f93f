//! Sandbox outcome classification.
//!
//! The sandbox runner never reports a semantic result; the meaning of a run is
//! derived only from markers in its combined output. All marker scanning lives
//! here.

use std::fmt;

/// Name of the exploit entry point in the generated test contract
pub const ENTRY_POINT: &str = "testFlaw";

/// Emitted by forge when any test in the suite fails or reverts
pub const FAIL_MARKER: &str = "Suite result: FAILED";

/// Emitted by forge when solc rejects the generated source
pub const COMPILE_ERROR_MARKER: &str = "Compiler run failed";

/// Emitted by forge when the entry point passes
pub const PASS_MARKER: &str = "[PASS] testFlaw()";

/// Verdict for one sandbox execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The exploit entry point passed
    Pass,
    /// The suite failed (assertion or revert)
    Fail,
    /// The generated source did not compile
    CompileError,
    /// None of the known markers were found
    Ambiguous,
}

impl Outcome {
    /// Fail and CompileError are handled identically by the controller
    pub fn should_continue(self) -> bool {
        matches!(self, Outcome::Fail | Outcome::CompileError)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::CompileError => "compile error",
            Outcome::Ambiguous => "ambiguous",
        };
        f.write_str(s)
    }
}

/// Classify a trace. Precedence: failure, compiler failure, pass, ambiguous.
pub fn classify(trace: &str) -> Outcome {
    if trace.contains(FAIL_MARKER) {
        Outcome::Fail
    } else if trace.contains(COMPILE_ERROR_MARKER) {
        Outcome::CompileError
    } else if trace.contains(PASS_MARKER) {
        Outcome::Pass
    } else {
        Outcome::Ambiguous
    }
}

/// One-line summary of why a run failed, for feedback prompts.
pub fn failure_reason(trace: &str) -> String {
    for line in trace.lines() {
        if let Some((_, rest)) = line.split_once("[FAIL:") {
            let reason = rest.split(']').next().unwrap_or(rest);
            return reason.trim().to_string();
        }

        if line.contains(COMPILE_ERROR_MARKER) || line.contains("Compilation failed") {
            return "Compilation failed.".to_string();
        }
    }

    "No failure information found.".to_string()
}
