//! Forge-backed sandbox runner.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use regex::Regex;
use tokio::fs;
use tokio::process::Command;

use super::{SandboxJob, SandboxMode, SandboxRunner};
use crate::config::SandboxConfig;
use crate::domain::outcome::FAIL_MARKER;
use crate::error::{QuimeraError, Result};
use crate::prompt::LOCAL_TEST_CONTRACT;

/// Test file written into a scratch project
pub const SCRATCH_TEST_FILE: &str = "test/Test.t.sol";

/// Test file written into a local project
pub const LOCAL_TEST_FILE: &str = "test/quimera/QuimeraTest.t.sol";

const ANSI_ESCAPE: &str = r"(?:\x1B[@-_]|[\x80-\x9F])[0-?]*[ -/]*[@-~]";

pub struct ForgeRunner {
    forge: String,
    timeout: Duration,
    foundry_toml: String,
    ansi: Regex,
}

impl ForgeRunner {
    pub fn new(config: &SandboxConfig) -> Result<Self> {
        let ansi = Regex::new(ANSI_ESCAPE).map_err(|e| QuimeraError::Sandbox(e.to_string()))?;
        Ok(Self {
            forge: config.forge_binary.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            foundry_toml: config.foundry_toml.clone(),
            ansi,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strip_ansi(&self, text: &str) -> String {
        self.ansi.replace_all(text, "").into_owned()
    }

    /// `forge init` a fresh project in `dir` and strip the scaffold
    async fn prepare_scratch(&self, dir: &Path, source: &str) -> Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir).await?;
        }
        fs::create_dir_all(dir).await?;

        info!("Initializing forge project in {}", dir.display());
        let init = Command::new(&self.forge)
            .args(["init", "--no-git"])
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| QuimeraError::Sandbox(format!("Failed to run {} init: {}", self.forge, e)))?;

        if !init.status.success() {
            return Err(QuimeraError::Sandbox(format!(
                "{} init failed: {}",
                self.forge,
                String::from_utf8_lossy(&init.stderr).trim()
            )));
        }

        fs::write(dir.join("foundry.toml"), &self.foundry_toml).await?;

        for scaffold in ["src/Counter.sol", "test/Counter.t.sol"] {
            let path = dir.join(scaffold);
            if path.exists() {
                fs::remove_file(path).await?;
            }
        }
        let scripts = dir.join("script");
        if scripts.exists() {
            fs::remove_dir_all(scripts).await?;
        }

        let test_path = dir.join(SCRATCH_TEST_FILE);
        if let Some(parent) = test_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(test_path, source).await?;
        Ok(())
    }

    async fn prepare_project(&self, root: &Path, source: &str) -> Result<()> {
        let test_path = root.join(LOCAL_TEST_FILE);
        if let Some(parent) = test_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(test_path, source).await?;
        Ok(())
    }

    async fn forge_test(&self, dir: &Path, job: &SandboxJob, match_contract: Option<&str>) -> Result<String> {
        let mut cmd = Command::new(&self.forge);
        cmd.args(["test", "-vvv", "--fork-url", &job.rpc_url]);
        if let Some(name) = match_contract {
            cmd.args(["--match-contract", name]);
        }
        cmd.env("FOUNDRY_FORK_BLOCK_NUMBER", job.block_number.to_string())
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Running forge test for iteration {}", job.iteration);
        let child = cmd
            .spawn()
            .map_err(|e| QuimeraError::Sandbox(format!("Failed to run {} test: {}", self.forge, e)))?;

        // Dropping the child on timeout kills it
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let stdout = self.strip_ansi(String::from_utf8_lossy(&output.stdout).trim());
                let stderr = self.strip_ansi(String::from_utf8_lossy(&output.stderr).trim());
                Ok(format!("{}\n{}", stderr, stdout))
            }
            Err(_) => {
                warn!("forge test for iteration {} exceeded {:?}, killed", job.iteration, self.timeout);
                Ok(timeout_trace(self.timeout))
            }
        }
    }
}

/// Trace reported for a run that never finished
fn timeout_trace(timeout: Duration) -> String {
    format!(
        "[FAIL: execution timed out after {:?}] testFlaw()\nThe test did not finish in time and was terminated. Avoid unbounded loops and excessive iterations.\n{}",
        timeout,
        FAIL_MARKER
    )
}

#[async_trait]
impl SandboxRunner for ForgeRunner {
    async fn run(&self, job: &SandboxJob) -> Result<String> {
        match &job.mode {
            SandboxMode::Scratch { dir } => {
                self.prepare_scratch(dir, &job.source).await?;
                self.forge_test(dir, job, None).await
            }
            SandboxMode::Project { root } => {
                self.prepare_project(root, &job.source).await?;
                self.forge_test(root, job, Some(LOCAL_TEST_CONTRACT)).await
            }
        }
    }
}
