//! get_contract_info tool - metadata for any contract on the session's fork

use std::sync::Arc;

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;

use super::{Tool, ToolResult};
use crate::analyzer::{AnalysisRequest, ContractAnalyzer};
use crate::domain::normalize_address;

pub struct ContractInfoTool {
    analyzer: Arc<dyn ContractAnalyzer>,
    /// Session request whose fork settings are reused
    base: AnalysisRequest,
}

impl ContractInfoTool {
    pub fn new(analyzer: Arc<dyn ContractAnalyzer>, base: AnalysisRequest) -> Self {
        Self { analyzer, base }
    }
}

#[async_trait]
impl Tool for ContractInfoTool {
    fn name(&self) -> &'static str {
        "get_contract_info"
    }

    fn description(&self) -> &'static str {
        "Get the interface, source code and current state variable values of a verified contract by address."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "string",
                    "description": "Contract address (0x-prefixed hex)"
                }
            },
            "required": ["address"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult, eyre::Error> {
        let raw = input["address"].as_str().ok_or_else(|| eyre!("address is required"))?;
        let address = normalize_address(raw).map_err(|e| eyre!("{}", e))?;

        let request = self.base.for_address(self.base.chain(), address.clone());
        Ok(match self.analyzer.analyze(&request).await {
            Some(info) => ToolResult::success(info.describe()),
            None => ToolResult::error(format!("No verified contract information found for {}", address)),
        })
    }
}
