//! Contract Analyzer: fetches the metadata the templates and prompts need.
//!
//! Two implementations exist: `ExplorerAnalyzer` for verified on-chain
//! contracts and `LocalAnalyzer` for Foundry projects on disk. Failures are
//! reported as `None`, the empty sentinel; callers decide how fatal that is.

mod abi;
mod explorer;
mod local;

pub use abi::{AbiEntry, AbiParam, interface_from_abi, is_erc20_like, storage_getters};
pub use explorer::{ExplorerAnalyzer, IMPLEMENTATION_SLOT};
pub use local::{BASE_TEST_CONTRACT, LocalAnalyzer};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info};

use crate::domain::{Chain, Session, TargetRef};

/// Contract metadata for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractInfo {
    /// Address (checksummed) or local path of the analyzed target
    pub address: String,
    pub contract_name: String,
    pub source_text: String,
    pub interface_text: String,
    /// `name = value` lines for readable state variables
    pub storage_values: String,
    pub is_value_token: bool,
    /// Source of the project's own test base contract (local targets only)
    pub base_template: Option<String>,
}

impl ContractInfo {
    /// Plain-text description returned by the contract info tool
    pub fn describe(&self) -> String {
        let text = format!(
            "The contract with address {} contains a {} contract with the following interface:\n\n{}\n\nIts source code is:\n\n```solidity\n{}\n```\n\nThe contract has a number of public/private variables, these are their current values:\n{}",
            self.address, self.contract_name, self.interface_text, self.source_text, self.storage_values
        );
        text.trim().to_string()
    }
}

/// Everything an analyzer needs to locate and read a target.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub target: TargetRef,
    pub rpc_url: String,
    pub block_number: u64,
    /// Contract to select when a source tree holds several
    pub contract: Option<String>,
}

impl AnalysisRequest {
    pub fn for_session(session: &Session) -> Self {
        Self {
            target: session.target.clone(),
            rpc_url: session.rpc_url.clone(),
            block_number: session.block_number,
            contract: session.contract.clone(),
        }
    }

    /// Same fork, different on-chain address
    pub fn for_address(&self, chain: Chain, address: String) -> Self {
        Self {
            target: TargetRef::OnChain { chain, address },
            rpc_url: self.rpc_url.clone(),
            block_number: self.block_number,
            contract: None,
        }
    }

    pub fn chain(&self) -> Chain {
        self.target.chain()
    }

    /// Cache key: lower-cased address or path
    pub fn cache_key(&self) -> String {
        match &self.target {
            TargetRef::OnChain { chain, address } => format!("{}:{}", chain, address.to_lowercase()),
            TargetRef::Local { path } => path.display().to_string(),
        }
    }
}

/// Source of contract metadata.
#[async_trait]
pub trait ContractAnalyzer: Send + Sync {
    /// Analyze a target; `None` when nothing usable could be extracted
    async fn analyze(&self, request: &AnalysisRequest) -> Option<ContractInfo>;
}

#[async_trait]
impl<A: ContractAnalyzer + ?Sized> ContractAnalyzer for Arc<A> {
    async fn analyze(&self, request: &AnalysisRequest) -> Option<ContractInfo> {
        (**self).analyze(request).await
    }
}

/// Process-lifetime cache of analyzer results. Never evicts.
#[derive(Debug, Default)]
pub struct AnalyzerCache {
    entries: Mutex<HashMap<String, ContractInfo>>,
}

impl AnalyzerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ContractInfo> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: String, info: ContractInfo) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, info);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps an analyzer with an `AnalyzerCache`. Empty results are not cached.
pub struct CachedAnalyzer<A> {
    inner: A,
    cache: Arc<AnalyzerCache>,
}

impl<A: ContractAnalyzer> CachedAnalyzer<A> {
    pub fn new(inner: A, cache: Arc<AnalyzerCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<AnalyzerCache> {
        &self.cache
    }
}

#[async_trait]
impl<A: ContractAnalyzer> ContractAnalyzer for CachedAnalyzer<A> {
    async fn analyze(&self, request: &AnalysisRequest) -> Option<ContractInfo> {
        let key = request.cache_key();
        if let Some(info) = self.cache.get(&key) {
            debug!("Analyzer cache hit for {}", key);
            return Some(info);
        }

        let info = self.inner.analyze(request).await?;
        self.cache.insert(key, info.clone());
        Some(info)
    }
}

/// Dispatches on the target kind: explorer for addresses, filesystem for paths.
pub struct TargetAnalyzer {
    explorer: Option<ExplorerAnalyzer>,
    local: LocalAnalyzer,
}

impl TargetAnalyzer {
    pub fn new(explorer: Option<ExplorerAnalyzer>, local: LocalAnalyzer) -> Self {
        Self { explorer, local }
    }
}

#[async_trait]
impl ContractAnalyzer for TargetAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Option<ContractInfo> {
        match &request.target {
            TargetRef::OnChain { .. } => match &self.explorer {
                Some(explorer) => explorer.analyze(request).await,
                None => {
                    info!("No explorer API key configured, cannot analyze {}", request.target);
                    None
                }
            },
            TargetRef::Local { .. } => self.local.analyze(request).await,
        }
    }
}
