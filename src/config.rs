use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub sandbox: SandboxConfig,
    pub manual: ManualConfig,
    pub retry: RetryConfig,
    pub supervisor: SupervisorConfig,
    pub explorer: ExplorerConfig,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub max_tool_rounds: u32,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            timeout_ms: 300000,
            max_tool_rounds: 16,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

const DEFAULT_FOUNDRY_TOML: &str = r#"[profile.default]
solc-version = "0.8.20"
optimizer = true
optimizer_runs = 100000000
via_ir = true
evm_version = "cancun"
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub forge_binary: String,
    pub timeout_secs: u64,
    pub foundry_toml: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            forge_binary: "forge".to_string(),
            timeout_secs: 900,
            foundry_toml: DEFAULT_FOUNDRY_TOML.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualConfig {
    pub poll_interval_ms: u64,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 500 }
    }
}

impl ManualConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub settle_min_secs: u64,
    pub settle_max_secs: u64,
    pub wait_min_secs: u64,
    pub wait_max_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            settle_min_secs: 1,
            settle_max_secs: 2,
            wait_min_secs: 10,
            wait_max_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub message_poll_ms: u64,
    pub clock_ms: u64,
    pub join_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            message_poll_ms: 100,
            clock_ms: 1000,
            join_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub api_url: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.etherscan.io/v2/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub template_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            sandbox: SandboxConfig::default(),
            manual: ManualConfig::default(),
            retry: RetryConfig::default(),
            supervisor: SupervisorConfig::default(),
            explorer: ExplorerConfig::default(),
            prompts: PromptsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(config.manual.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.retry.wait_min_secs, 10);
        assert_eq!(config.retry.wait_max_secs, 20);
        assert_eq!(config.supervisor.message_poll_ms, 100);
        assert_eq!(config.sandbox.forge_binary, "forge");
        assert!(config.sandbox.foundry_toml.contains("via_ir = true"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("quimera.yml");
        fs::write(&path, "sandbox:\n  timeout_secs: 60\nmanual:\n  poll_interval_ms: 50\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sandbox.timeout_secs, 60);
        assert_eq!(config.sandbox.forge_binary, "forge");
        assert_eq!(config.manual.poll_interval_ms, 50);
        assert_eq!(config.llm.max_tool_rounds, 16);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let path = PathBuf::from("/nonexistent/quimera.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
