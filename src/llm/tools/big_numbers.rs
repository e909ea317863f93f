//! 256-bit arithmetic tools; models are unreliable at exact big-number math

use alloy_primitives::U256;
use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;

use super::{Tool, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigNumberOp {
    Add,
    Subtract,
    Multiply,
}

pub struct BigNumberTool {
    op: BigNumberOp,
}

impl BigNumberTool {
    pub fn new(op: BigNumberOp) -> Self {
        Self { op }
    }

    /// One tool per operation
    pub fn all() -> Vec<Self> {
        vec![
            Self::new(BigNumberOp::Add),
            Self::new(BigNumberOp::Subtract),
            Self::new(BigNumberOp::Multiply),
        ]
    }
}

fn operand(input: &Value, key: &str) -> Result<U256, eyre::Error> {
    let raw = match &input[key] {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => return Err(eyre!("{} is required", key)),
        other => return Err(eyre!("{} must be a decimal string, got {}", key, other)),
    };
    raw.parse::<U256>().map_err(|e| eyre!("Invalid number '{}': {}", raw, e))
}

#[async_trait]
impl Tool for BigNumberTool {
    fn name(&self) -> &'static str {
        match self.op {
            BigNumberOp::Add => "add_big_numbers",
            BigNumberOp::Subtract => "subtract_big_numbers",
            BigNumberOp::Multiply => "multiply_big_numbers",
        }
    }

    fn description(&self) -> &'static str {
        match self.op {
            BigNumberOp::Add => "Add two unsigned 256-bit integers given as decimal strings.",
            BigNumberOp::Subtract => "Subtract b from a, both unsigned 256-bit integers given as decimal strings.",
            BigNumberOp::Multiply => "Multiply two unsigned 256-bit integers given as decimal strings.",
        }
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "a": { "type": "string", "description": "First operand (decimal)" },
                "b": { "type": "string", "description": "Second operand (decimal)" }
            },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult, eyre::Error> {
        let a = operand(&input, "a")?;
        let b = operand(&input, "b")?;

        let result = match self.op {
            BigNumberOp::Add => a.checked_add(b),
            BigNumberOp::Subtract => a.checked_sub(b),
            BigNumberOp::Multiply => a.checked_mul(b),
        };

        Ok(match result {
            Some(value) => ToolResult::success(value.to_string()),
            None => ToolResult::error(format!("{} overflows uint256", self.name())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_add() {
        let tool = BigNumberTool::new(BigNumberOp::Add);
        let result = tool
            .execute(json!({"a": "1000000000000000000000", "b": "1"}))
            .await
            .unwrap();
        assert_eq!(result, ToolResult::success("1000000000000000000001"));
    }

    #[tokio::test]
    async fn test_multiply_accepts_numbers() {
        let tool = BigNumberTool::new(BigNumberOp::Multiply);
        let result = tool.execute(json!({"a": 3, "b": "7"})).await.unwrap();
        assert_eq!(result.content, "21");
    }

    #[tokio::test]
    async fn test_subtract_underflow_is_tool_error() {
        let tool = BigNumberTool::new(BigNumberOp::Subtract);
        let result = tool.execute(json!({"a": "1", "b": "2"})).await.unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_multiply_overflow_is_tool_error() {
        let tool = BigNumberTool::new(BigNumberOp::Multiply);
        let max = U256::MAX.to_string();
        let result = tool.execute(json!({"a": max, "b": "2"})).await.unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_missing_operand() {
        let tool = BigNumberTool::new(BigNumberOp::Add);
        assert!(tool.execute(json!({"a": "1"})).await.is_err());
        assert!(tool.execute(json!({"a": "x", "b": "1"})).await.is_err());
    }
}
