//! Command-line interface.
//!
//! One command, three roles:
//! - supervisor (default): owns the terminal and spawns the worker
//! - worker (hidden `--worker`): runs the session, reports over stdout
//! - headless (`--headless`): runs the session in-process without a monitor

use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::domain::SessionArgs;

/// Quimera - iterative exploit synthesis against a forked chain
#[derive(Parser, Debug, Clone)]
#[command(name = "quimera")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target: chain:0xaddress, 0xaddress (mainnet) or a local path
    pub target: String,

    /// Fork block number (falls back to FOUNDRY_FORK_BLOCK_NUMBER)
    #[arg(long)]
    pub block_number: Option<String>,

    /// Contract to target when the source defines several
    #[arg(long)]
    pub contract: Option<String>,

    /// Token the exploit must gain (weth, usdc, arb)
    #[arg(long, default_value = "weth")]
    pub valuable_token: String,

    /// "manual" or a model id
    #[arg(long, default_value = "manual")]
    pub model: String,

    /// Generation budget
    #[arg(long, default_value_t = 1)]
    pub iterations: u32,

    /// Extended thinking budget in tokens (0 disables)
    #[arg(long, default_value_t = 0)]
    pub thinking_budget: u32,

    /// File sent to the model with the first prompt
    #[arg(long)]
    pub attachment: Option<PathBuf>,

    /// Root for per-target working directories
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run without the terminal monitor
    #[arg(long, conflicts_with = "worker")]
    pub headless: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, hide = true, requires = "cancel_file")]
    pub worker: bool,

    #[arg(long, hide = true)]
    pub cancel_file: Option<PathBuf>,
}

/// Process role selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Supervisor,
    Worker,
    Headless,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Supervisor => "supervisor",
            Role::Worker => "worker",
            Role::Headless => "headless",
        }
    }
}

impl Cli {
    pub fn role(&self) -> Role {
        if self.worker {
            Role::Worker
        } else if self.headless {
            Role::Headless
        } else {
            Role::Supervisor
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn session_args(&self) -> SessionArgs {
        SessionArgs {
            target: self.target.clone(),
            block_number: self.block_number.clone(),
            contract: self.contract.clone(),
            valuable_token: self.valuable_token.clone(),
            model: self.model.clone(),
            iterations: self.iterations,
            thinking_budget: self.thinking_budget,
            attachment: self.attachment.clone(),
            working_dir: self.working_dir.clone(),
        }
    }

    /// Arguments that re-run this invocation as the worker
    pub fn worker_args(&self, cancel_file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.target.clone().into()];
        let mut push = |flag: &str, value: OsString| {
            args.push(flag.into());
            args.push(value);
        };

        if let Some(block) = &self.block_number {
            push("--block-number", block.into());
        }
        if let Some(contract) = &self.contract {
            push("--contract", contract.into());
        }
        push("--valuable-token", self.valuable_token.clone().into());
        push("--model", self.model.clone().into());
        push("--iterations", self.iterations.to_string().into());
        push("--thinking-budget", self.thinking_budget.to_string().into());
        if let Some(attachment) = &self.attachment {
            push("--attachment", attachment.into());
        }
        if let Some(dir) = &self.working_dir {
            push("--working-dir", dir.into());
        }
        if let Some(config) = &self.config {
            push("--config", config.into());
        }
        push("--cancel-file", cancel_file.into());

        args.push("--worker".into());
        if self.verbose {
            args.push("--verbose".into());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["quimera", "mainnet:0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"]).unwrap();
        assert_eq!(cli.role(), Role::Supervisor);
        assert_eq!(cli.valuable_token, "weth");
        assert_eq!(cli.model, "manual");
        assert_eq!(cli.iterations, 1);
        assert_eq!(cli.thinking_budget, 0);
    }

    #[test]
    fn test_target_is_required() {
        assert!(Cli::try_parse_from(["quimera"]).is_err());
    }

    #[test]
    fn test_worker_requires_cancel_file() {
        assert!(Cli::try_parse_from(["quimera", "x", "--worker"]).is_err());
        let cli = Cli::try_parse_from(["quimera", "x", "--worker", "--cancel-file", "/tmp/c"]).unwrap();
        assert_eq!(cli.role(), Role::Worker);
    }

    #[test]
    fn test_headless_role() {
        let cli = Cli::try_parse_from(["quimera", "./src/Vault.sol", "--headless", "--iterations", "3"]).unwrap();
        assert_eq!(cli.role(), Role::Headless);
        assert_eq!(cli.session_args().iterations, 3);
    }

    #[test]
    fn test_worker_args_round_trip() {
        let cli = Cli::try_parse_from([
            "quimera",
            "bsc:0x0000000000000000000000000000000000000001",
            "--block-number",
            "123",
            "--model",
            "claude-sonnet-4-5",
            "--thinking-budget",
            "2048",
            "--working-dir",
            "/tmp/sessions",
        ])
        .unwrap();

        let mut argv: Vec<OsString> = vec!["quimera".into()];
        argv.extend(cli.worker_args(Path::new("/tmp/cancel")));
        let worker = Cli::try_parse_from(argv).unwrap();

        assert_eq!(worker.role(), Role::Worker);
        assert_eq!(worker.cancel_file, Some(PathBuf::from("/tmp/cancel")));
        assert_eq!(worker.session_args(), cli.session_args());
    }
}
