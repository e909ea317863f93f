//! On-chain analyzer backed by a block explorer API and a JSON-RPC endpoint.

use std::time::Duration;

use alloy_primitives::{Address, I256, U256};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::abi::{AbiEntry, interface_from_abi, is_erc20_like, storage_getters};
use super::{AnalysisRequest, ContractAnalyzer, ContractInfo};
use crate::domain::{TargetRef, normalize_address};
use crate::error::{QuimeraError, Result};

/// EIP-1967 implementation slot (keccak("eip1967.proxy.implementation") - 1)
pub const IMPLEMENTATION_SLOT: &str = "0x360894A13BA1A3210667C828492DB98DCA3E2076CC3735A920A3CA505D382BBC";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceRecord {
    #[serde(default)]
    source_code: String,
    #[serde(rename = "ABI", default)]
    abi: String,
    #[serde(default)]
    contract_name: String,
}

#[derive(Debug, Deserialize)]
struct StandardJson {
    sources: serde_json::Map<String, Value>,
}

/// Analyzer for verified contracts deployed on a supported chain.
pub struct ExplorerAnalyzer {
    client: Client,
    api_url: String,
    api_key: String,
}

impl ExplorerAnalyzer {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| QuimeraError::Analyzer(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn rpc(&self, rpc_url: &str, method: &str, params: Value) -> Result<String> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: Value = self.client.post(rpc_url).json(&body).send().await?.json().await?;

        if let Some(error) = response.get("error") {
            return Err(QuimeraError::Analyzer(format!("{} failed: {}", method, error)));
        }

        response["result"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| QuimeraError::Analyzer(format!("{} returned no result", method)))
    }

    /// Follow an EIP-1967 proxy to its implementation, if any
    async fn resolve_implementation(&self, request: &AnalysisRequest, address: &str) -> Result<String> {
        let block = format!("0x{:x}", request.block_number);
        let raw = self
            .rpc(&request.rpc_url, "eth_getStorageAt", json!([address, IMPLEMENTATION_SLOT, block]))
            .await?;

        let implementation = word_to_address(&raw)?;
        if implementation == Address::ZERO {
            return Ok(address.to_string());
        }

        let implementation = implementation.to_checksum(None);
        info!("Proxy detected, using target address {}", implementation);
        Ok(implementation)
    }

    async fn fetch_source(&self, request: &AnalysisRequest, address: &str) -> Result<SourceRecord> {
        let chain_id = request.chain().chain_id().to_string();
        let response: ExplorerResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if response.status != "1" {
            return Err(QuimeraError::Analyzer(format!(
                "Explorer error for {}: {} {}",
                address, response.message, response.result
            )));
        }

        let mut records: Vec<SourceRecord> = serde_json::from_value(response.result)?;
        if records.is_empty() || records[0].source_code.is_empty() {
            return Err(QuimeraError::Analyzer(format!("{} is not verified", address)));
        }
        Ok(records.swap_remove(0))
    }

    /// Read every zero-argument getter at the pinned block
    async fn read_storage_values(&self, request: &AnalysisRequest, address: &str, abi: &[AbiEntry]) -> String {
        let block = format!("0x{:x}", request.block_number);
        let mut values = String::new();

        for getter in storage_getters(abi) {
            let data = format!("0x{}", hex::encode(getter.selector()));
            let call = json!([{ "to": address, "data": data }, block]);

            match self.rpc(&request.rpc_url, "eth_call", call).await {
                Ok(raw) => match decode_word(&raw, &getter.outputs[0].kind) {
                    Some(value) => values.push_str(&format!("{} = {}\n", getter.name, value)),
                    None => debug!("Could not decode {} for {}", raw, getter.name),
                },
                Err(e) => debug!("eth_call {} failed: {}", getter.name, e),
            }
        }

        values
    }

    async fn try_analyze(&self, request: &AnalysisRequest) -> Result<ContractInfo> {
        let TargetRef::OnChain { address, .. } = &request.target else {
            return Err(QuimeraError::Analyzer("Explorer analyzer needs an address".to_string()));
        };
        let address = normalize_address(address)?;

        let implementation = self.resolve_implementation(request, &address).await?;
        let record = self.fetch_source(request, &implementation).await?;

        let abi: Vec<AbiEntry> = serde_json::from_str(&record.abi)?;
        let contract_name = match &request.contract {
            Some(name) => name.clone(),
            None => record.contract_name.clone(),
        };

        // Values are read through the proxy, which owns the storage
        let storage_values = self.read_storage_values(request, &address, &abi).await;

        Ok(ContractInfo {
            address,
            interface_text: interface_from_abi(&contract_name, &abi),
            source_text: flatten_sources(&record.source_code),
            contract_name,
            storage_values,
            is_value_token: is_erc20_like(&abi),
            base_template: None,
        })
    }
}

#[async_trait]
impl ContractAnalyzer for ExplorerAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Option<ContractInfo> {
        match self.try_analyze(request).await {
            Ok(info) => {
                info!("Analyzed {} ({})", info.address, info.contract_name);
                Some(info)
            }
            Err(e) => {
                warn!("Failed to analyze {}: {}", request.target, e);
                None
            }
        }
    }
}

/// Flatten explorer source: plain text, or standard-JSON (optionally wrapped in `{{ }}`)
pub fn flatten_sources(source_code: &str) -> String {
    let trimmed = source_code.trim();
    let json_text = if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    if !json_text.starts_with('{') {
        return source_code.to_string();
    }

    let sources = match serde_json::from_str::<StandardJson>(json_text) {
        Ok(standard) => standard.sources,
        // Multi-file format without settings: `{ "File.sol": { "content": ... } }`
        Err(_) => match serde_json::from_str::<serde_json::Map<String, Value>>(json_text) {
            Ok(map) => map,
            Err(_) => return source_code.to_string(),
        },
    };

    sources
        .iter()
        .filter_map(|(path, file)| file["content"].as_str().map(|content| format!("// File: {}\n{}", path, content)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn word_bytes(raw: &str) -> Result<Vec<u8>> {
    let digits = raw.trim_start_matches("0x");
    let padded = format!("{:0>64}", digits);
    hex::decode(&padded).map_err(|e| QuimeraError::Analyzer(format!("Invalid hex word {}: {}", raw, e)))
}

fn word_to_address(raw: &str) -> Result<Address> {
    let bytes = word_bytes(raw)?;
    if bytes.len() < 20 {
        return Err(QuimeraError::Analyzer(format!("Word too short: {}", raw)));
    }
    Ok(Address::from_slice(&bytes[bytes.len() - 20..]))
}

/// Decode a single ABI-encoded return word of an elementary type
pub fn decode_word(raw: &str, kind: &str) -> Option<String> {
    let bytes = word_bytes(raw).ok()?;
    if bytes.len() < 32 {
        return None;
    }
    let word = &bytes[..32];

    if kind == "bool" {
        Some((word.iter().any(|b| *b != 0)).to_string())
    } else if kind == "address" {
        Some(Address::from_slice(&word[12..]).to_checksum(None))
    } else if kind.starts_with("uint") {
        Some(U256::from_be_slice(word).to_string())
    } else if kind.starts_with("int") {
        Some(I256::from_raw(U256::from_be_slice(word)).to_string())
    } else {
        None
    }
}
