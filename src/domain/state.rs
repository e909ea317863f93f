//! Per-iteration state threaded through the session loop.
//!
//! Each iteration produces a new `IterationState` through structural update;
//! the session controller is the only owner.

use serde::{Deserialize, Serialize};

use super::chains::ChainAddresses;
use super::session::Session;
use crate::analyzer::ContractInfo;
use crate::artifact::ResponseFields;
use crate::error::Result;

/// Everything the templates need to render a test and a prompt.
///
/// Serialized field names are the template variable names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationState {
    pub iteration: u32,
    pub target_address: String,
    pub target_contract_name: String,
    pub target_code: String,
    pub interface: String,
    pub private_variables_values: String,
    pub constraints: String,
    pub valuable_token_name: String,
    #[serde(flatten)]
    pub addresses: ChainAddresses,
    pub assign_token_address: String,
    pub execute_exploit_code: String,
    pub extra_interfaces: String,
    pub extra_contracts: String,
    pub test_code: String,
    pub trace: String,
}

impl IterationState {
    /// State for iteration 0, before any generation
    pub fn initial(session: &Session, info: &ContractInfo, constraints: String, exploit_code: &str) -> Result<Self> {
        let addresses = ChainAddresses::resolve(session.chain(), &session.valuable_token)?;

        let assign_token_address = if info.is_value_token {
            format!("token = {};", info.address)
        } else {
            String::new()
        };

        Ok(Self {
            iteration: 0,
            target_address: info.address.clone(),
            target_contract_name: info.contract_name.clone(),
            target_code: info.source_text.clone(),
            interface: info.interface_text.clone(),
            private_variables_values: info.storage_values.clone(),
            constraints,
            valuable_token_name: session.valuable_token.to_uppercase(),
            addresses,
            assign_token_address,
            execute_exploit_code: exploit_code.to_string(),
            extra_interfaces: String::new(),
            extra_contracts: String::new(),
            test_code: String::new(),
            trace: String::new(),
        })
    }

    pub fn with_test_code(self, test_code: String) -> Self {
        Self { test_code, ..self }
    }

    pub fn with_trace(self, trace: String) -> Self {
        Self { trace, ..self }
    }

    /// Fold a parsed response into the next iteration's state
    pub fn next(self, fields: ResponseFields) -> Self {
        Self {
            iteration: self.iteration + 1,
            execute_exploit_code: fields.execute_exploit_code,
            extra_interfaces: fields.extra_interfaces,
            extra_contracts: fields.extra_contracts,
            test_code: String::new(),
            trace: String::new(),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Environment, SessionArgs};

    fn session() -> Session {
        let args = SessionArgs {
            target: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string(),
            valuable_token: "weth".to_string(),
            model: "manual".to_string(),
            iterations: 1,
            ..Default::default()
        };
        let env = Environment {
            explorer_api_key: Some("key".to_string()),
            rpc_url: Some("http://localhost:8545".to_string()),
            fork_block_number: Some("1".to_string()),
        };
        Session::resolve(&args, &env).unwrap()
    }

    fn info(is_value_token: bool) -> ContractInfo {
        ContractInfo {
            address: "0x00000000000000000000000000000000000000aA".to_string(),
            contract_name: "Vault".to_string(),
            source_text: "contract Vault {}".to_string(),
            interface_text: "interface IVault {}".to_string(),
            storage_values: "owner = 0x01\n".to_string(),
            is_value_token,
            base_template: None,
        }
    }

    #[test]
    fn test_initial_state() {
        let state = IterationState::initial(&session(), &info(false), "rules".to_string(), "code").unwrap();
        assert_eq!(state.iteration, 0);
        assert_eq!(state.valuable_token_name, "WETH");
        assert_eq!(state.target_contract_name, "Vault");
        assert_eq!(state.execute_exploit_code, "code");
        assert!(state.assign_token_address.is_empty());
        assert!(state.trace.is_empty());
    }

    #[test]
    fn test_value_token_assigns_token() {
        let state = IterationState::initial(&session(), &info(true), String::new(), "").unwrap();
        assert_eq!(
            state.assign_token_address,
            "token = 0x00000000000000000000000000000000000000aA;"
        );
    }

    #[test]
    fn test_next_replaces_generated_fields() {
        let state = IterationState::initial(&session(), &info(false), String::new(), "old")
            .unwrap()
            .with_test_code("source".to_string())
            .with_trace("trace".to_string());

        let next = state.clone().next(ResponseFields {
            execute_exploit_code: "new".to_string(),
            extra_interfaces: "interface IFoo {}".to_string(),
            extra_contracts: String::new(),
        });

        assert_eq!(next.iteration, 1);
        assert_eq!(next.execute_exploit_code, "new");
        assert_eq!(next.extra_interfaces, "interface IFoo {}");
        assert!(next.trace.is_empty());
        assert!(next.test_code.is_empty());
        assert_eq!(next.target_code, state.target_code);
    }

    #[test]
    fn test_template_context_names() {
        let state = IterationState::initial(&session(), &info(false), String::new(), "").unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("executeExploitCode").is_some());
        assert!(json.get("privateVariablesValues").is_some());
        assert!(json.get("flashloanCall").is_some());
        assert!(json.get("uniswapRouterAddress").is_some());
    }
}
