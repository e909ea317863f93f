//! Callable tools offered to the model during automated generation
//!
//! - `get_contract_info`: metadata for another on-chain contract
//! - `add_big_numbers`, `subtract_big_numbers`, `multiply_big_numbers`:
//!   256-bit decimal arithmetic

mod big_numbers;
mod contract_info;
mod executor;

pub use big_numbers::{BigNumberOp, BigNumberTool};
pub use contract_info::ContractInfoTool;
pub use executor::ToolExecutor;

use async_trait::async_trait;
use serde_json::Value;

use super::types::ToolDefinition;

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches LLM tool_use name)
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    async fn execute(&self, input: Value) -> Result<ToolResult, eyre::Error>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}
