//! Prompt Renderer - render tests and prompts from an `IterationState`
//!
//! Uses Handlebars with HTML escaping disabled; missing variables render as
//! empty strings.

use handlebars::Handlebars;
use serde::Serialize;

use super::loader::PromptLoader;
use super::templates::TEMPLATE_NAMES;
use crate::analyzer::BASE_TEST_CONTRACT;
use crate::domain::{IterationState, failure_reason};
use crate::error::{QuimeraError, Result};

/// Name the local base test contract is renamed to before running
pub const LOCAL_TEST_CONTRACT: &str = "QuimeraTest";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NextPromptContext<'a> {
    #[serde(flatten)]
    state: &'a IterationState,
    failure_reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConstraintsContext<'a> {
    valuable_token_name: &'a str,
}

/// Renders the registered templates
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    /// Register every known template from the loader
    pub fn new(loader: &PromptLoader) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        for name in TEMPLATE_NAMES {
            let source = loader.load(name)?;
            handlebars
                .register_template_string(name, source)
                .map_err(|e| QuimeraError::Template(format!("Failed to register template '{}': {}", name, e)))?;
        }

        Ok(Self { handlebars })
    }

    /// Render a template string with any serializable context
    pub fn render_with<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| QuimeraError::Template(format!("Failed to render template: {}", e)))
    }

    fn render_named<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| QuimeraError::Template(format!("Failed to render template '{}': {}", name, e)))
    }

    /// Constraint text for the session's valuable token
    pub fn constraints(&self, valuable_token_name: &str) -> Result<String> {
        self.render_named("constraints", &ConstraintsContext { valuable_token_name })
    }

    /// Test source for the state. A local project's base test, when given,
    /// replaces the embedded contract and is renamed so forge can match it.
    pub fn test_source(&self, state: &IterationState, base_template: Option<&str>) -> Result<String> {
        match base_template {
            Some(template) => Ok(self
                .render_with(template, state)?
                .replace(BASE_TEST_CONTRACT, LOCAL_TEST_CONTRACT)),
            None => self.render_named("test_contract", state),
        }
    }

    /// Prompt sent after iteration 0
    pub fn initial_prompt(&self, state: &IterationState) -> Result<String> {
        self.render_named("initial_prompt", state)
    }

    /// Feedback prompt built from the last trace
    pub fn next_prompt(&self, state: &IterationState) -> Result<String> {
        let context = NextPromptContext {
            state,
            failure_reason: failure_reason(&state.trace),
        };
        self.render_named("next_prompt", &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Chain, ChainAddresses};

    fn renderer() -> PromptRenderer {
        PromptRenderer::new(&PromptLoader::embedded()).unwrap()
    }

    fn state() -> IterationState {
        IterationState {
            iteration: 0,
            target_address: "0x00000000000000000000000000000000000000aA".to_string(),
            target_contract_name: "Vault".to_string(),
            target_code: "contract Vault { mapping(address => uint) b; }".to_string(),
            interface: "interface IVault {}".to_string(),
            private_variables_values: "owner = 0x01\n".to_string(),
            constraints: "RULES".to_string(),
            valuable_token_name: "WETH".to_string(),
            addresses: ChainAddresses::resolve(Chain::Mainnet, "weth").unwrap(),
            assign_token_address: String::new(),
            execute_exploit_code: "function executeExploit(uint256 amount) internal { target.call(\"\"); }".to_string(),
            extra_interfaces: "interface IExtra {}".to_string(),
            extra_contracts: String::new(),
            test_code: "TEST SOURCE".to_string(),
            trace: "[FAIL: revert: nope] testFlaw() (gas: 1)\nSuite result: FAILED".to_string(),
        }
    }

    #[test]
    fn test_render_test_contract() {
        let source = renderer().test_source(&state(), None).unwrap();
        assert!(source.contains("contract TestFlaw is Test"));
        assert!(source.contains("function testFlaw() external"));
        assert!(source.contains("address internal target = 0x00000000000000000000000000000000000000aA;"));
        assert!(source.contains("IERC20(0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2)"));
        assert!(source.contains("IBalancerVault(flashloanProvider).flashLoan"));
        assert!(source.contains("interface IExtra {}"));
        // No HTML escaping of generated code
        assert!(source.contains("target.call(\"\");"));
        assert!(!source.contains("{{"));
    }

    #[test]
    fn test_render_local_base_template() {
        let base = "contract QuimeraBaseTest is Test {\n    {{executeExploitCode}}\n}";
        let source = renderer().test_source(&state(), Some(base)).unwrap();
        assert!(source.starts_with("contract QuimeraTest is Test"));
        assert!(source.contains("function executeExploit(uint256 amount)"));
    }

    #[test]
    fn test_constraints_mention_token() {
        let text = renderer().constraints("USDC").unwrap();
        assert!(text.contains("You start with no tokens except USDC"));
        assert!(text.contains("<executeExploitCode>"));
    }

    #[test]
    fn test_initial_prompt() {
        let prompt = renderer().initial_prompt(&state()).unwrap();
        assert!(prompt.contains("RULES"));
        assert!(prompt.contains("mapping(address => uint)"));
        assert!(prompt.contains("owner = 0x01"));
        assert!(prompt.contains("TEST SOURCE"));
        assert!(prompt.contains("Suite result: FAILED"));
    }

    #[test]
    fn test_next_prompt_includes_failure_reason() {
        let prompt = renderer().next_prompt(&state()).unwrap();
        assert!(prompt.contains("The failure reason was: revert: nope"));
        assert!(prompt.contains("Suite result: FAILED"));
        assert!(prompt.ends_with("RULES\n"));
    }
}
