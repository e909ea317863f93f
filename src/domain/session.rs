//! Session: the immutable description of one exploit search.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy_primitives::Address;
use log::info;
use serde::{Deserialize, Serialize};

use super::chains::{Chain, ChainAddresses};
use crate::error::{QuimeraError, Result};

/// Placeholder value shipped in example env files
const PLACEHOLDER: &str = "TODO";

/// What is being attacked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetRef {
    /// Verified contract deployed on a chain (checksummed address)
    OnChain { chain: Chain, address: String },
    /// Foundry project (or single file) on disk
    Local { path: PathBuf },
}

impl TargetRef {
    /// Parse `chain:0xaddress`, `0xaddress` or a local path
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.contains("0x") {
            return Ok(TargetRef::Local { path: PathBuf::from(raw) });
        }

        let (chain, address) = match raw.split_once(':') {
            Some((chain, address)) => (chain.parse::<Chain>()?, address),
            None => (Chain::Mainnet, raw),
        };

        let address = normalize_address(address)?;
        Ok(TargetRef::OnChain { chain, address })
    }

    pub fn chain(&self) -> Chain {
        match self {
            TargetRef::OnChain { chain, .. } => *chain,
            TargetRef::Local { .. } => Chain::Mainnet,
        }
    }

    pub fn is_on_chain(&self) -> bool {
        matches!(self, TargetRef::OnChain { .. })
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::OnChain { chain, address } => write!(f, "{}:{}", chain, address),
            TargetRef::Local { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Checksummed form of a hex address
pub fn normalize_address(raw: &str) -> Result<String> {
    let address = Address::from_str(raw.trim())
        .map_err(|e| QuimeraError::Config(format!("Invalid address '{}': {}", raw, e)))?;
    Ok(address.to_checksum(None))
}

/// Which generation backend answers prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationSpec {
    /// A human pastes responses into the answer file
    Manual,
    /// Automated model conversation
    Model {
        name: String,
        thinking_budget: u32,
        attachment: Option<PathBuf>,
    },
}

impl GenerationSpec {
    pub fn from_model_flag(model: &str, thinking_budget: u32, attachment: Option<PathBuf>) -> Self {
        if model.eq_ignore_ascii_case("manual") {
            GenerationSpec::Manual
        } else {
            GenerationSpec::Model {
                name: model.to_string(),
                thinking_budget,
                attachment,
            }
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, GenerationSpec::Manual)
    }
}

/// Raw session inputs as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionArgs {
    pub target: String,
    pub block_number: Option<String>,
    pub contract: Option<String>,
    pub valuable_token: String,
    pub model: String,
    pub iterations: u32,
    pub thinking_budget: u32,
    pub attachment: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

/// Environment values the session depends on.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub explorer_api_key: Option<String>,
    pub rpc_url: Option<String>,
    pub fork_block_number: Option<String>,
}

impl Environment {
    pub fn from_env() -> Self {
        Self {
            explorer_api_key: std::env::var("ETHERSCAN_API_KEY").ok(),
            rpc_url: std::env::var("FOUNDRY_RPC_URL").ok(),
            fork_block_number: std::env::var("FOUNDRY_FORK_BLOCK_NUMBER").ok(),
        }
    }
}

/// Immutable session description, created once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub target: TargetRef,
    pub block_number: u64,
    pub valuable_token: String,
    pub generation: GenerationSpec,
    pub iterations: u32,
    pub working_dir: PathBuf,
    pub contract: Option<String>,
    pub rpc_url: String,
    pub explorer_api_key: Option<String>,
}

impl Session {
    /// Validate inputs and build the session. Every error here is fatal-input.
    pub fn resolve(args: &SessionArgs, env: &Environment) -> Result<Self> {
        let target = TargetRef::parse(&args.target)?;

        let explorer_api_key = if target.is_on_chain() {
            match env.explorer_api_key.as_deref() {
                None => {
                    return Err(QuimeraError::Config(
                        "Please set the ETHERSCAN_API_KEY environment variable.".to_string(),
                    ));
                }
                Some(key) if key.trim().is_empty() || key == PLACEHOLDER => {
                    return Err(QuimeraError::Config(
                        "Please set the ETHERSCAN_API_KEY environment variable to a valid API key.".to_string(),
                    ));
                }
                Some(key) => Some(key.to_string()),
            }
        } else {
            info!("Assuming local contract source file or directory with mainnet chain");
            env.explorer_api_key.clone()
        };

        let block_number = match &args.block_number {
            Some(block) => {
                info!("Using block number {} from command line argument", block);
                block.clone()
            }
            None => match &env.fork_block_number {
                Some(block) => {
                    info!("Using block number {} from environment variable", block);
                    block.clone()
                }
                None => {
                    return Err(QuimeraError::Config(
                        "Please set FOUNDRY_FORK_BLOCK_NUMBER or pass --block-number.".to_string(),
                    ));
                }
            },
        };
        let block_number = block_number
            .trim()
            .parse::<u64>()
            .map_err(|_| QuimeraError::Config(format!("Invalid block number: {}", block_number)))?;

        let rpc_url = match env.rpc_url.as_deref() {
            Some(url) if !url.trim().is_empty() && url != PLACEHOLDER => url.to_string(),
            _ => {
                return Err(QuimeraError::Config(
                    "Please set the FOUNDRY_RPC_URL environment variable.".to_string(),
                ));
            }
        };

        let valuable_token = args.valuable_token.to_lowercase();
        // Reject unknown tokens up front rather than mid-session
        ChainAddresses::resolve(target.chain(), &valuable_token)?;

        if let Some(attachment) = &args.attachment
            && !attachment.is_file()
        {
            return Err(QuimeraError::Config(format!(
                "Attachment not found: {}",
                attachment.display()
            )));
        }

        let working_dir = args
            .working_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("quimera_foundry_sessions"));

        Ok(Self {
            target,
            block_number,
            valuable_token,
            generation: GenerationSpec::from_model_flag(&args.model, args.thinking_budget, args.attachment.clone()),
            iterations: args.iterations,
            working_dir,
            contract: args.contract.clone(),
            rpc_url,
            explorer_api_key,
        })
    }

    pub fn chain(&self) -> Chain {
        self.target.chain()
    }

    /// Directory holding iteration `index`'s record (and, on-chain, its forge project)
    pub fn iteration_dir(&self, index: u32) -> PathBuf {
        match &self.target {
            TargetRef::OnChain { address, .. } => self.working_dir.join(address).join(index.to_string()),
            TargetRef::Local { path } => project_root(path).join("test").join("quimera").join("log").join(index.to_string()),
        }
    }

    /// Directory shown in the monitor's file tree
    pub fn target_dir(&self) -> PathBuf {
        match &self.target {
            TargetRef::OnChain { address, .. } => self.working_dir.join(address),
            TargetRef::Local { path } => project_root(path).join("test").join("quimera"),
        }
    }

    /// Status bar summary of the fork
    pub fn network_info(&self) -> String {
        format!("{} @ block {}", self.target, self.block_number)
    }
}

/// A local target may name a single file; forge runs from its directory
pub fn project_root(path: &Path) -> PathBuf {
    if path.is_file() {
        path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
    } else {
        path.to_path_buf()
    }
}

/// Fail fast when a required external binary is missing.
pub fn check_required_binaries(binaries: &[&str]) -> Result<()> {
    for binary in binaries {
        if which::which(binary).is_err() {
            return Err(QuimeraError::MissingBinary(format!(
                "{} is not installed. Please install it to continue.",
                binary
            )));
        }
    }
    Ok(())
}
