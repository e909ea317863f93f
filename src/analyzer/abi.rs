//! ABI helpers: interface generation, token detection and getter selection.

use alloy_primitives::keccak256;
use serde::Deserialize;

/// One ABI parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One ABI entry (functions, events, errors, constructor...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub state_mutability: String,
}

impl AbiEntry {
    pub fn is_function(&self) -> bool {
        self.kind == "function"
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.kind.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// Four-byte function selector
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    fn has_tuple(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|p| p.kind.starts_with("tuple"))
    }

    /// Solidity declaration for an interface body, or `None` when it
    /// needs struct definitions the ABI does not carry
    fn declaration(&self) -> Option<String> {
        if !self.is_function() || self.has_tuple() {
            return None;
        }

        let inputs = self
            .inputs
            .iter()
            .map(|p| param_decl(p, "calldata"))
            .collect::<Vec<_>>()
            .join(", ");

        let mutability = match self.state_mutability.as_str() {
            "view" | "pure" | "payable" => format!(" {}", self.state_mutability),
            _ => String::new(),
        };

        let returns = if self.outputs.is_empty() {
            String::new()
        } else {
            let outputs = self
                .outputs
                .iter()
                .map(|p| param_decl(p, "memory"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" returns ({})", outputs)
        };

        Some(format!(
            "    function {}({}) external{}{};",
            self.name, inputs, mutability, returns
        ))
    }
}

fn param_decl(param: &AbiParam, location: &str) -> String {
    let needs_location = param.kind == "string" || param.kind == "bytes" || param.kind.ends_with(']');
    let mut decl = param.kind.clone();
    if needs_location {
        decl.push(' ');
        decl.push_str(location);
    }
    if !param.name.is_empty() {
        decl.push(' ');
        decl.push_str(&param.name);
    }
    decl
}

/// Interface declaration `I<name>` for every representable function
pub fn interface_from_abi(contract_name: &str, abi: &[AbiEntry]) -> String {
    let mut out = format!("interface I{} {{\n", contract_name);
    for entry in abi {
        if let Some(decl) = entry.declaration() {
            out.push_str(&decl);
            out.push('\n');
        }
    }
    out.push('}');
    out
}

const ERC20_FUNCTIONS: [&str; 6] = [
    "totalSupply()",
    "balanceOf(address)",
    "transfer(address,uint256)",
    "transferFrom(address,address,uint256)",
    "approve(address,uint256)",
    "allowance(address,address)",
];

/// True when the ABI exposes the full ERC-20 function set
pub fn is_erc20_like(abi: &[AbiEntry]) -> bool {
    let signatures: Vec<String> = abi.iter().filter(|e| e.is_function()).map(AbiEntry::signature).collect();
    ERC20_FUNCTIONS.iter().all(|f| signatures.iter().any(|s| s == f))
}

fn is_readable_type(kind: &str) -> bool {
    kind.starts_with("uint") || kind.starts_with("int") || kind == "bool" || kind == "address"
}

/// Zero-argument view getters with a single elementary return value
pub fn storage_getters(abi: &[AbiEntry]) -> Vec<&AbiEntry> {
    abi.iter()
        .filter(|e| e.is_function())
        .filter(|e| e.state_mutability == "view" || e.state_mutability == "pure")
        .filter(|e| e.inputs.is_empty())
        .filter(|e| e.outputs.len() == 1 && is_readable_type(&e.outputs[0].kind) && !e.outputs[0].kind.ends_with(']'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[
        {"type":"constructor","inputs":[]},
        {"type":"function","name":"totalSupply","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"balanceOf","inputs":[{"name":"account","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"transferFrom","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"approve","inputs":[{"name":"spender","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"allowance","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
        {"type":"function","name":"owner","inputs":[],"outputs":[{"name":"","type":"address"}],"stateMutability":"view"},
        {"type":"function","name":"position","inputs":[],"outputs":[{"name":"","type":"tuple","components":[]}],"stateMutability":"view"},
        {"type":"function","name":"deposit","inputs":[],"outputs":[],"stateMutability":"payable"},
        {"type":"event","name":"Transfer","inputs":[{"name":"from","type":"address"}]}
    ]"#;

    fn abi() -> Vec<AbiEntry> {
        serde_json::from_str(ABI).unwrap()
    }

    #[test]
    fn test_selector() {
        let entry = abi().into_iter().find(|e| e.name == "transfer").unwrap();
        assert_eq!(entry.signature(), "transfer(address,uint256)");
        assert_eq!(entry.selector(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_interface_from_abi() {
        let interface = interface_from_abi("Token", &abi());
        assert!(interface.starts_with("interface IToken {"));
        assert!(interface.contains("    function transfer(address to, uint256 amount) external returns (bool);"));
        assert!(interface.contains("    function name() external view returns (string memory);"));
        assert!(interface.contains("    function deposit() external payable;"));
        assert!(!interface.contains("position"));
        assert!(!interface.contains("Transfer"));
        assert!(interface.ends_with('}'));
    }

    #[test]
    fn test_is_erc20_like() {
        assert!(is_erc20_like(&abi()));
        let partial: Vec<AbiEntry> = abi().into_iter().filter(|e| e.name != "allowance").collect();
        assert!(!is_erc20_like(&partial));
    }

    #[test]
    fn test_storage_getters() {
        let entries = abi();
        let names: Vec<&str> = storage_getters(&entries).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["totalSupply", "owner"]);
    }
}
