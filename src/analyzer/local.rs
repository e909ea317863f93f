//! Filesystem analyzer for Foundry projects.
//!
//! A lightweight regex scan, not a compiler: it finds contract declarations,
//! their bodies and public entry points, which is all the prompts need.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;

use super::{AnalysisRequest, ContractAnalyzer, ContractInfo};
use crate::domain::TargetRef;
use crate::error::{QuimeraError, Result};

/// Contract every local project must provide as the test template
pub const BASE_TEST_CONTRACT: &str = "QuimeraBaseTest";

const EXCLUDED_DIRS: [&str; 4] = ["lib", "out", "cache", "node_modules"];

/// A contract-like declaration found in a source file
#[derive(Debug, Clone)]
struct Declaration {
    name: String,
    kind: String,
    is_abstract: bool,
    bases: Vec<String>,
    body: String,
    file: PathBuf,
}

impl Declaration {
    fn is_concrete_contract(&self) -> bool {
        self.kind == "contract" && !self.is_abstract
    }

    fn in_test_tree(&self, root: &Path) -> bool {
        self.file
            .strip_prefix(root)
            .map(|rel| rel.starts_with("test") || rel.starts_with("script"))
            .unwrap_or(false)
    }
}

/// Analyzer for local Solidity sources.
pub struct LocalAnalyzer {
    declaration: Regex,
    entry_point: Regex,
}

impl LocalAnalyzer {
    pub fn new() -> Result<Self> {
        let declaration = Regex::new(r"(?m)^\s*(abstract\s+)?(contract|interface|library)\s+(\w+)(?:\s+is\s+([^{]+))?\s*\{")
            .map_err(|e| QuimeraError::Analyzer(e.to_string()))?;
        let entry_point = Regex::new(r"function\s+(\w+)\s*\(([^)]*)\)([^{;]*)")
            .map_err(|e| QuimeraError::Analyzer(e.to_string()))?;
        Ok(Self {
            declaration,
            entry_point,
        })
    }

    /// All `.sol` files below `root`, skipping build and dependency trees
    fn source_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let pattern = format!("{}/**/*.sol", root.display());
        let paths = glob::glob(&pattern).map_err(|e| QuimeraError::Analyzer(format!("Invalid glob: {}", e)))?;

        let mut files = Vec::new();
        for path in paths.flatten() {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let excluded = EXCLUDED_DIRS.iter().any(|dir| rel.starts_with(dir)) || rel.starts_with("test/quimera");
            if !excluded {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse_declarations(&self, file: &Path, source: &str) -> Vec<Declaration> {
        let mut declarations = Vec::new();
        for caps in self.declaration.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            // The match ends just past the opening brace
            let open = whole.end() - 1;
            let Some(close) = matching_brace(source, open) else {
                warn!("Unbalanced braces in {}", file.display());
                continue;
            };

            let bases = caps
                .get(4)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .filter_map(|b| b.split('(').next())
                        .map(|b| b.trim().to_string())
                        .filter(|b| !b.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            declarations.push(Declaration {
                name: caps[3].to_string(),
                kind: caps[2].to_string(),
                is_abstract: caps.get(1).is_some(),
                bases,
                body: source[whole.start()..=close].trim().to_string(),
                file: file.to_path_buf(),
            });
        }
        declarations
    }

    /// Public and external function headers of a declaration
    fn entry_points(&self, decl: &Declaration) -> Vec<String> {
        self.entry_point
            .captures_iter(&decl.body)
            .filter(|caps| {
                let modifiers = &caps[3];
                modifiers.contains("public") || modifiers.contains("external") || decl.kind == "interface"
            })
            .map(|caps| {
                let modifiers = &caps[3];
                let mutability = ["view", "pure", "payable"]
                    .iter()
                    .find(|m| modifiers.split_whitespace().any(|w| w == **m))
                    .map(|m| format!(" {}", m))
                    .unwrap_or_default();
                let returns = modifiers
                    .find("returns")
                    .map(|idx| format!(" {}", modifiers[idx..].trim()))
                    .unwrap_or_default();
                let params = caps[2].split_whitespace().collect::<Vec<_>>().join(" ");
                format!("    function {}({}) external{}{};", &caps[1], params, mutability, returns)
            })
            .collect()
    }

    fn analyze_root(&self, root: &Path, contract: Option<&str>) -> Result<ContractInfo> {
        let mut declarations = Vec::new();
        let mut sources = HashMap::new();
        for file in self.source_files(root)? {
            let source = fs::read_to_string(&file)?;
            declarations.extend(self.parse_declarations(&file, &source));
            sources.insert(file, source);
        }

        let base = declarations
            .iter()
            .find(|d| d.name == BASE_TEST_CONTRACT)
            .ok_or_else(|| {
                QuimeraError::Analyzer(format!("{} contract not found in {}", BASE_TEST_CONTRACT, root.display()))
            })?;
        let base_template = sources.get(&base.file).cloned().unwrap_or_default();

        let selected = match contract {
            Some(name) => declarations
                .iter()
                .find(|d| d.name == name)
                .ok_or_else(|| QuimeraError::Analyzer(format!("Contract {} not found", name)))?,
            None => declarations
                .iter()
                .filter(|d| d.is_concrete_contract() && !d.in_test_tree(root) && d.name != BASE_TEST_CONTRACT)
                .max_by_key(|d| self.entry_points(d).len())
                .ok_or_else(|| QuimeraError::Analyzer("No concrete contract found".to_string()))?,
        };

        let names: Vec<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
        info!("Contracts found: {:?}, selected {}", names, selected.name);

        let mut visited = BTreeSet::from([selected.name.clone()]);
        let source_text = self.collect_source(selected, &declarations, &mut visited);

        let mut interface = format!("interface I{} {{\n", selected.name);
        for header in self.entry_points(selected) {
            interface.push_str(&header);
            interface.push('\n');
        }
        interface.push('}');

        Ok(ContractInfo {
            address: root.display().to_string(),
            contract_name: selected.name.clone(),
            source_text,
            interface_text: interface,
            storage_values: String::new(),
            is_value_token: false,
            base_template: Some(base_template),
        })
    }

    /// Declaration body followed by its non-interface local bases
    fn collect_source(&self, decl: &Declaration, all: &[Declaration], visited: &mut BTreeSet<String>) -> String {
        let mut code = decl.body.clone();
        for base_name in &decl.bases {
            if !visited.insert(base_name.clone()) {
                debug!("Skipping already visited base contract: {}", base_name);
                continue;
            }
            let Some(base) = all.iter().find(|d| &d.name == base_name) else {
                continue;
            };
            if base.kind == "interface" {
                continue;
            }
            code.push_str("\n\n");
            code.push_str(&self.collect_source(base, all, visited));
        }
        code
    }
}

/// Index of the brace closing the one at `open`
fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in source[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

#[async_trait]
impl ContractAnalyzer for LocalAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Option<ContractInfo> {
        let TargetRef::Local { path } = &request.target else {
            return None;
        };

        match self.analyze_root(path, request.contract.as_deref()) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("Failed to analyze {}: {}", path.display(), e);
                None
            }
        }
    }
}
