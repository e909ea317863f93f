//! Response parsing
//!
//! Extracts the tagged fields (exploit code, extra interfaces, extra
//! contracts) from free-form generated text.

mod parser;

pub use parser::*;
