//! Sandbox Test Runner
//!
//! Executes a rendered test contract against the pinned fork and returns the
//! combined tool output. A run never reports a verdict itself; see
//! [`crate::domain::classify`].

mod forge;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{Session, TargetRef, project_root};
use crate::error::Result;

pub use forge::{ForgeRunner, LOCAL_TEST_FILE, SCRATCH_TEST_FILE};

/// Where and how a test is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxMode {
    /// Fresh forge project in `dir`, recreated on every run
    Scratch { dir: PathBuf },
    /// Existing foundry project; the test is dropped under `test/quimera/`
    Project { root: PathBuf },
}

/// One execution request.
#[derive(Debug, Clone)]
pub struct SandboxJob {
    pub iteration: u32,
    pub source: String,
    pub rpc_url: String,
    pub block_number: u64,
    pub mode: SandboxMode,
}

impl SandboxJob {
    pub fn for_session(session: &Session, iteration: u32, source: String) -> Self {
        let mode = match &session.target {
            TargetRef::OnChain { .. } => SandboxMode::Scratch {
                dir: session.iteration_dir(iteration),
            },
            TargetRef::Local { path } => SandboxMode::Project {
                root: project_root(path),
            },
        };

        Self {
            iteration,
            source,
            rpc_url: session.rpc_url.clone(),
            block_number: session.block_number,
            mode,
        }
    }
}

#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Run the job and return its combined output
    async fn run(&self, job: &SandboxJob) -> Result<String>;
}

#[async_trait]
impl<R: SandboxRunner + ?Sized> SandboxRunner for std::sync::Arc<R> {
    async fn run(&self, job: &SandboxJob) -> Result<String> {
        (**self).run(job).await
    }
}
