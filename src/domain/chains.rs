//! Per-chain constants used to wire the generated test contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QuimeraError, Result};

/// Chains a fork can be pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Mainnet,
    Bsc,
    Arbi,
}

impl Chain {
    /// Chain id understood by the multichain explorer API
    pub fn chain_id(self) -> u64 {
        match self {
            Chain::Mainnet => 1,
            Chain::Bsc => 56,
            Chain::Arbi => 42161,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Chain::Mainnet => "mainnet",
            Chain::Bsc => "bsc",
            Chain::Arbi => "arbi",
        }
    }

    pub fn weth(self) -> &'static str {
        match self {
            Chain::Mainnet => "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            Chain::Bsc => "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c",
            Chain::Arbi => "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1",
        }
    }

    /// Address of the valuable token `name` on this chain
    pub fn valuable_token(self, name: &str) -> Result<&'static str> {
        match (name, self) {
            ("weth", chain) => Ok(chain.weth()),
            ("usdc", Chain::Arbi) => Ok("0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
            ("usdc", Chain::Mainnet) => Ok("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            ("arb", Chain::Arbi) => Ok("0x912CE59144191C1204E64559FE8253a0e49E6548"),
            ("arb", _) => Err(QuimeraError::Config("ARB token is only available on Arbitrum".to_string())),
            (other, chain) => Err(QuimeraError::Config(format!(
                "Valuable token '{}' is not supported on {}",
                other, chain
            ))),
        }
    }

    pub fn uniswap_router(self) -> &'static str {
        match self {
            Chain::Mainnet => "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
            Chain::Arbi => "0x8cFe327CEc66d1C090Dd72bd0FF11d690C33a2Eb",
            Chain::Bsc => "0x10ED43C718714eb63d5aA57B78B54704E256024E",
        }
    }

    pub fn flashloan_provider(self) -> &'static str {
        match self {
            Chain::Mainnet | Chain::Arbi => "0xBA12222222228d8Ba445958a75a0704d566BF2C8",
            Chain::Bsc => "0x6098A5638d8D7e9Ed2f952d35B2b67c34EC6B476",
        }
    }

    /// Statement that requests the flash loan from the provider
    pub fn flashloan_call(self) -> &'static str {
        match self {
            Chain::Mainnet | Chain::Arbi => {
                r#"IBalancerVault(flashloanProvider).flashLoan(address(this), tokens, amounts, "");"#
            }
            Chain::Bsc => r#"IDODO(flashloanProvider).flashLoan(amounts[0], 0, address(this), "0x0");"#,
        }
    }

    /// Opening of the provider callback; the body binds `amount`
    pub fn flashloan_receiver(self) -> &'static str {
        match self {
            Chain::Mainnet | Chain::Arbi => {
                "function receiveFlashLoan(\n        address[] memory,\n        uint256[] memory amounts,\n        uint256[] memory,\n        bytes memory\n    ) external {\n        uint256 amount = amounts[0];"
            }
            Chain::Bsc => "function DPPFlashLoanCall(address, uint256 amount, uint256, bytes memory) external {",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = QuimeraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "eth" | "ethereum" => Ok(Chain::Mainnet),
            "bsc" | "bnb" => Ok(Chain::Bsc),
            "arbi" | "arbitrum" => Ok(Chain::Arbi),
            other => Err(QuimeraError::Config(format!("Unsupported chain: {}", other))),
        }
    }
}

/// Addresses and snippets computed once per session from the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainAddresses {
    pub valuable_token_address: String,
    pub uniswap_router_address: String,
    pub flashloan_provider_address: String,
    pub flashloan_call: String,
    pub flashloan_receiver: String,
}

impl ChainAddresses {
    pub fn resolve(chain: Chain, valuable_token: &str) -> Result<Self> {
        Ok(Self {
            valuable_token_address: chain.valuable_token(valuable_token)?.to_string(),
            uniswap_router_address: chain.uniswap_router().to_string(),
            flashloan_provider_address: chain.flashloan_provider().to_string(),
            flashloan_call: chain.flashloan_call().to_string(),
            flashloan_receiver: chain.flashloan_receiver().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain() {
        assert_eq!("mainnet".parse::<Chain>().unwrap(), Chain::Mainnet);
        assert_eq!("BSC".parse::<Chain>().unwrap(), Chain::Bsc);
        assert_eq!("arbi".parse::<Chain>().unwrap(), Chain::Arbi);
        assert!("solana".parse::<Chain>().is_err());
    }

    #[test]
    fn test_chain_ids() {
        assert_eq!(Chain::Mainnet.chain_id(), 1);
        assert_eq!(Chain::Bsc.chain_id(), 56);
        assert_eq!(Chain::Arbi.chain_id(), 42161);
    }

    #[test]
    fn test_valuable_tokens() {
        assert_eq!(Chain::Bsc.valuable_token("weth").unwrap(), Chain::Bsc.weth());
        assert!(Chain::Mainnet.valuable_token("usdc").is_ok());
        assert!(Chain::Arbi.valuable_token("arb").is_ok());
        assert!(Chain::Mainnet.valuable_token("arb").is_err());
        assert!(Chain::Bsc.valuable_token("usdc").is_err());
        assert!(Chain::Mainnet.valuable_token("doge").is_err());
    }

    #[test]
    fn test_bsc_uses_dodo_flashloan() {
        let addresses = ChainAddresses::resolve(Chain::Bsc, "weth").unwrap();
        assert!(addresses.flashloan_call.contains("IDODO"));
        assert!(addresses.flashloan_receiver.contains("DPPFlashLoanCall"));
    }

    #[test]
    fn test_addresses_serialize_camel_case() {
        let addresses = ChainAddresses::resolve(Chain::Mainnet, "weth").unwrap();
        let json = serde_json::to_value(&addresses).unwrap();
        assert_eq!(json["valuableTokenAddress"], Chain::Mainnet.weth());
        assert!(json["flashloanCall"].as_str().unwrap().contains("IBalancerVault"));
    }
}
