//! Session controller integration tests
//!
//! Drives full sessions with scripted analyzer, sandbox and generation
//! backends and checks outcomes, persisted records and supervisor messages.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quimera::analyzer::{AnalysisRequest, ContractAnalyzer, ContractInfo};
use quimera::backend::{AutomatedBackend, AutomatedOptions, GenerationBackend, GenerationError, RetryPolicy};
use quimera::coordination::CancellationSignal;
use quimera::domain::outcome::{FAIL_MARKER, PASS_MARKER};
use quimera::domain::{Environment, Session, SessionArgs};
use quimera::error::{QuimeraError, Result};
use quimera::ipc::{CollectingSink, Message};
use quimera::llm::{CompletionResponse, ContentBlock, MockLlmClient, StopReason, ToolExecutor, Usage};
use quimera::prompt::{PromptLoader, PromptRenderer};
use quimera::runner::{SessionController, SessionOutcome};
use quimera::sandbox::{SandboxJob, SandboxRunner};
use quimera::storage::{IterationLog, PROMPT_FILE, RESPONSE_FILE};
use tempfile::TempDir;

const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
const EXPLOIT: &str = "<executeExploitCode>vault.withdrawAll();</executeExploitCode>";

fn failing_trace() -> String {
    format!(
        "Ran 1 test for test/Test.t.sol:TestFlaw\n[FAIL: revert: not owner] testFlaw() (gas: 1000)\n{}",
        FAIL_MARKER
    )
}

fn passing_trace() -> String {
    format!("Ran 1 test for test/Test.t.sol:TestFlaw\n{} (gas: 1000)\nSuite result: ok.", PASS_MARKER)
}

struct FixedAnalyzer(Option<ContractInfo>);

#[async_trait]
impl ContractAnalyzer for FixedAnalyzer {
    async fn analyze(&self, _request: &AnalysisRequest) -> Option<ContractInfo> {
        self.0.clone()
    }
}

fn vault_info() -> ContractInfo {
    ContractInfo {
        address: WETH.to_string(),
        contract_name: "Vault".to_string(),
        source_text: "contract Vault { function withdrawAll() external {} }".to_string(),
        interface_text: "interface IVault { function withdrawAll() external; }".to_string(),
        storage_values: "owner = 0x0000000000000000000000000000000000000001".to_string(),
        ..Default::default()
    }
}

/// Returns queued traces in order, repeating the last one
#[derive(Clone, Default)]
struct ScriptedRunner {
    traces: Arc<Mutex<VecDeque<String>>>,
    jobs: Arc<Mutex<Vec<(u32, String)>>>,
}

impl ScriptedRunner {
    fn new(traces: &[String]) -> Self {
        Self {
            traces: Arc::new(Mutex::new(traces.iter().cloned().collect())),
            jobs: Arc::default(),
        }
    }

    fn jobs(&self) -> Vec<(u32, String)> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxRunner for ScriptedRunner {
    async fn run(&self, job: &SandboxJob) -> Result<String> {
        self.jobs.lock().unwrap().push((job.iteration, job.source.clone()));
        let mut traces = self.traces.lock().unwrap();
        let trace = if traces.len() > 1 {
            traces.pop_front()
        } else {
            traces.front().cloned()
        };
        trace.ok_or_else(|| QuimeraError::Sandbox("no trace scripted".to_string()))
    }
}

struct ScriptedBackend {
    responses: VecDeque<std::result::Result<String, GenerationError>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<std::result::Result<String, GenerationError>>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                responses: responses.into(),
                prompts: prompts.clone(),
            },
            prompts,
        )
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn request(&mut self, prompt: &str) -> std::result::Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .pop_front()
            .unwrap_or_else(|| Ok(EXPLOIT.to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn session(dir: &Path, iterations: u32) -> Session {
    let args = SessionArgs {
        target: format!("mainnet:{}", WETH),
        block_number: Some("19000000".to_string()),
        valuable_token: "weth".to_string(),
        model: "manual".to_string(),
        iterations,
        working_dir: Some(dir.to_path_buf()),
        ..Default::default()
    };
    let env = Environment {
        explorer_api_key: Some("test-key".to_string()),
        rpc_url: Some("http://localhost:8545".to_string()),
        fork_block_number: None,
    };
    Session::resolve(&args, &env).unwrap()
}

struct Harness {
    controller: SessionController<FixedAnalyzer, ScriptedRunner>,
    runner: ScriptedRunner,
    sink: Arc<CollectingSink>,
    cancel: CancellationSignal,
    session: Session,
}

fn harness(
    dir: &Path,
    iterations: u32,
    info: Option<ContractInfo>,
    traces: &[String],
    backend: Box<dyn GenerationBackend>,
) -> Harness {
    let session = session(dir, iterations);
    let runner = ScriptedRunner::new(traces);
    let sink = Arc::new(CollectingSink::new());
    let cancel = CancellationSignal::local();
    let renderer = PromptRenderer::new(&PromptLoader::embedded()).unwrap();

    let controller = SessionController::new(
        session.clone(),
        FixedAnalyzer(info),
        runner.clone(),
        backend,
        renderer,
        sink.clone(),
        cancel.clone(),
    )
    .with_retry(RetryPolicy::zero());

    Harness {
        controller,
        runner,
        sink,
        cancel,
        session,
    }
}

#[tokio::test]
async fn test_exploit_found_after_one_generation() {
    let temp = TempDir::new().unwrap();
    let (backend, prompts) = ScriptedBackend::new(vec![Ok(EXPLOIT.to_string())]);
    let mut h = harness(
        temp.path(),
        3,
        Some(vault_info()),
        &[failing_trace(), passing_trace()],
        Box::new(backend),
    );

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Succeeded { iteration: 1 });
    assert!(outcome.exploit_found());
    assert_eq!(h.controller.generations(), 1);

    let jobs = h.runner.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].0, 1);
    assert!(jobs[1].1.contains("vault.withdrawAll();"));

    // The first prompt is the initial prompt persisted with iteration 0
    let prompts = prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("contract Vault"));

    let log = IterationLog::new(&h.session);
    let first = log.read(0).unwrap();
    assert_eq!(first.prompt, prompts[0]);
    assert!(first.response.is_none());
    assert!(!log.dir(0).join(RESPONSE_FILE).exists());

    let second = log.read(1).unwrap();
    assert_eq!(second.prompt, prompts[0]);
    assert_eq!(second.response.as_deref(), Some(EXPLOIT));
    assert!(log.dir(1).join(PROMPT_FILE).exists());
}

#[tokio::test]
async fn test_budget_exhausted_reports_last_failure() {
    let temp = TempDir::new().unwrap();
    let (backend, prompts) = ScriptedBackend::new(vec![]);
    let mut h = harness(temp.path(), 2, Some(vault_info()), &[failing_trace()], Box::new(backend));

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Exhausted {
            iterations: 2,
            last_failure: "revert: not owner".to_string()
        }
    );
    assert!(outcome.keeps_monitor_open());

    // Budget N means N generations and N + 1 sandbox runs
    assert_eq!(h.controller.generations(), 2);
    assert_eq!(h.runner.jobs().len(), 3);

    // Later prompts carry the failure feedback, not the initial prompt
    let prompts = prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    assert_ne!(prompts[0], prompts[1]);
    assert!(prompts[1].contains("revert: not owner"));
}

#[tokio::test]
async fn test_single_iteration_budget_stops_after_one_generation() {
    let temp = TempDir::new().unwrap();
    let (backend, prompts) = ScriptedBackend::new(vec![]);
    let mut h = harness(temp.path(), 1, Some(vault_info()), &[failing_trace()], Box::new(backend));

    let outcome = h.controller.run().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Exhausted { iterations: 1, .. }));
    assert!(!outcome.exploit_found());
    assert_eq!(prompts.lock().unwrap().len(), 1);
    assert_eq!(h.runner.jobs().len(), 2);
}

#[tokio::test]
async fn test_ambiguous_trace_aborts_without_generation() {
    let temp = TempDir::new().unwrap();
    let (backend, prompts) = ScriptedBackend::new(vec![]);
    let mut h = harness(
        temp.path(),
        5,
        Some(vault_info()),
        &["Error: could not connect to RPC".to_string()],
        Box::new(backend),
    );

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Aborted { iteration: 0 });
    assert!(!outcome.keeps_monitor_open());
    assert!(prompts.lock().unwrap().is_empty());
    assert!(IterationLog::new(&h.session).read(0).is_ok());
}

#[tokio::test]
async fn test_analyzer_failure_ends_before_sandbox() {
    let temp = TempDir::new().unwrap();
    let (backend, _) = ScriptedBackend::new(vec![]);
    let mut h = harness(temp.path(), 1, None, &[passing_trace()], Box::new(backend));

    let outcome = h.controller.run().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::AnalyzerFailed { .. }));
    assert!(h.runner.jobs().is_empty());
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let temp = TempDir::new().unwrap();
    let (backend, prompts) = ScriptedBackend::new(vec![
        Err(GenerationError::Transient("overloaded".to_string())),
        Err(GenerationError::Transient("timeout".to_string())),
        Ok(EXPLOIT.to_string()),
    ]);
    let mut h = harness(
        temp.path(),
        1,
        Some(vault_info()),
        &[failing_trace(), passing_trace()],
        Box::new(backend),
    );

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Succeeded { iteration: 1 });
    assert_eq!(prompts.lock().unwrap().len(), 3);
    assert_eq!(h.controller.generations(), 1);

    let retries = h
        .sink
        .data_of("blocker")
        .into_iter()
        .filter(|b| b.contains("retrying"))
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn test_fatal_generation_error_is_an_error() {
    let temp = TempDir::new().unwrap();
    let (backend, _) = ScriptedBackend::new(vec![Err(GenerationError::Fatal("bad request".to_string()))]);
    let mut h = harness(temp.path(), 1, Some(vault_info()), &[failing_trace()], Box::new(backend));

    let err = h.controller.run().await.unwrap_err();
    assert!(matches!(err, QuimeraError::Generation(_)));
}

#[tokio::test]
async fn test_cancel_before_start() {
    let temp = TempDir::new().unwrap();
    let (backend, _) = ScriptedBackend::new(vec![]);
    let mut h = harness(temp.path(), 1, Some(vault_info()), &[failing_trace()], Box::new(backend));

    h.cancel.cancel().unwrap();
    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Cancelled { iteration: 0 });
    assert!(h.runner.jobs().is_empty());
}

#[tokio::test]
async fn test_cancel_during_generation() {
    let temp = TempDir::new().unwrap();
    let (backend, _) = ScriptedBackend::new(vec![Err(GenerationError::Cancelled)]);
    let mut h = harness(temp.path(), 3, Some(vault_info()), &[failing_trace()], Box::new(backend));

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Cancelled { iteration: 1 });
    assert_eq!(h.runner.jobs().len(), 1);
}

#[tokio::test]
async fn test_session_messages_open_with_target_and_directory() {
    let temp = TempDir::new().unwrap();
    let (backend, prompts) = ScriptedBackend::new(vec![]);
    let mut h = harness(temp.path(), 1, Some(vault_info()), &[passing_trace()], Box::new(backend));

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Succeeded { iteration: 0 });
    assert!(prompts.lock().unwrap().is_empty());
    assert_eq!(h.controller.generations(), 0);
    assert_eq!(h.runner.jobs().len(), 1);

    let log = IterationLog::new(&h.session);
    let first = log.read(0).unwrap();
    assert!(first.prompt.contains("contract Vault"));
    assert!(first.response.is_none());
    assert!(!log.dir(1).exists());

    let messages = h.sink.messages();
    assert_eq!(messages[0], Message::network_info(h.session.network_info()));
    assert_eq!(
        messages[1],
        Message::change_directory(h.session.target_dir().to_string_lossy())
    );
}

#[tokio::test]
async fn test_automated_backend_drives_session() {
    let temp = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::new());
    llm.push_response(CompletionResponse {
        content: vec![ContentBlock::text(EXPLOIT)],
        stop_reason: StopReason::EndTurn,
        usage: Usage::new(100, 20),
    });
    let backend = AutomatedBackend::new(llm.clone(), ToolExecutor::new(), AutomatedOptions::default());

    let mut h = harness(
        temp.path(),
        1,
        Some(vault_info()),
        &[failing_trace(), passing_trace()],
        Box::new(backend),
    );

    let outcome = h.controller.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Succeeded { iteration: 1 });
    assert_eq!(llm.requests().len(), 1);
}
