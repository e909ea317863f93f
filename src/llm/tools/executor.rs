//! Tool executor - manages tool registration and execution

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BigNumberTool, ContractInfoTool, Tool, ToolResult};
use crate::analyzer::{AnalysisRequest, ContractAnalyzer};
use crate::llm::types::{ContentBlock, ToolCall, ToolDefinition};

/// Registry of the tools offered to the model
pub struct ToolExecutor {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolExecutor {
    /// Create an empty executor
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Contract lookup plus the big-number helpers
    pub fn standard(analyzer: Arc<dyn ContractAnalyzer>, base: AnalysisRequest) -> Self {
        let mut executor = Self::new();
        executor.add_tool(Box::new(ContractInfoTool::new(analyzer, base)));
        for tool in BigNumberTool::all() {
            executor.add_tool(Box::new(tool));
        }
        executor
    }

    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions for the LLM, in name order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a tool call
    pub async fn execute(&self, tool_call: &ToolCall) -> ToolResult {
        match self.tools.get(&tool_call.name) {
            Some(tool) => match tool.execute(tool_call.input.clone()).await {
                Ok(result) => result,
                Err(e) => ToolResult::error(format!("Tool error: {}", e)),
            },
            None => ToolResult::error(format!("Unknown tool: {}", tool_call.name)),
        }
    }

    /// Execute every call, returning `tool_result` blocks in call order
    pub async fn execute_all(&self, tool_calls: &[ToolCall]) -> Vec<ContentBlock> {
        let mut results = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let result = self.execute(call).await;
            results.push(ContentBlock::ToolResult {
                tool_use_id: call.id.clone(),
                content: result.content,
                is_error: result.is_error,
            });
        }

        results
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ContractInfo;
    use crate::domain::{Chain, TargetRef};
    use async_trait::async_trait;
    use serde_json::json;

    struct NoAnalyzer;

    #[async_trait]
    impl ContractAnalyzer for NoAnalyzer {
        async fn analyze(&self, _request: &AnalysisRequest) -> Option<ContractInfo> {
            None
        }
    }

    fn executor() -> ToolExecutor {
        let base = AnalysisRequest {
            target: TargetRef::OnChain {
                chain: Chain::Mainnet,
                address: "0x0000000000000000000000000000000000000001".to_string(),
            },
            rpc_url: String::new(),
            block_number: 1,
            contract: None,
        };
        ToolExecutor::standard(Arc::new(NoAnalyzer), base)
    }

    #[test]
    fn test_standard_tools() {
        let executor = executor();
        assert_eq!(
            executor.tool_names(),
            vec![
                "add_big_numbers",
                "get_contract_info",
                "multiply_big_numbers",
                "subtract_big_numbers"
            ]
        );
        assert_eq!(executor.definitions().len(), 4);
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let call = ToolCall::new("call_1", "read_file", json!({}));
        let result = executor().execute(&call).await;
        assert!(result.is_error);
        assert!(result.content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_execute_all_preserves_ids() {
        let calls = vec![
            ToolCall::new("call_1", "add_big_numbers", json!({"a": "2", "b": "3"})),
            ToolCall::new("call_2", "add_big_numbers", json!({"a": "2"})),
        ];
        let results = executor().execute_all(&calls).await;

        assert_eq!(
            results[0],
            ContentBlock::ToolResult {
                tool_use_id: "call_1".to_string(),
                content: "5".to_string(),
                is_error: false
            }
        );
        match &results[1] {
            ContentBlock::ToolResult {
                tool_use_id, is_error, ..
            } => {
                assert_eq!(tool_use_id, "call_2");
                assert!(is_error);
            }
            other => panic!("unexpected block {:?}", other),
        }
    }
}
