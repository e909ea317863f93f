//! Prompt System - embedded templates, overrides and rendering
//!
//! Both the Solidity test contract and the prompts sent to the generation
//! backend are handlebars templates rendered from an `IterationState`.

mod loader;
mod render;
mod templates;

pub use loader::PromptLoader;
pub use render::{LOCAL_TEST_CONTRACT, PromptRenderer};
pub use templates::{INITIAL_EXPLOIT_CODE, TEMPLATE_NAMES};
