//! Worker bootstrap: wire a `SessionController` from a session and config,
//! run it, and tell the supervisor how it ended.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use super::controller::{SessionController, SessionOutcome};
use crate::analyzer::{AnalysisRequest, AnalyzerCache, CachedAnalyzer, ContractAnalyzer, ExplorerAnalyzer, LocalAnalyzer, TargetAnalyzer};
use crate::backend::{Attachment, AutomatedBackend, AutomatedOptions, GenerationBackend, ManualBackend, RetryPolicy};
use crate::config::Config;
use crate::coordination::CancellationSignal;
use crate::domain::{GenerationSpec, Session, check_required_binaries};
use crate::error::{QuimeraError, Result};
use crate::ipc::{Message, MessageSink};
use crate::llm::{AnthropicClient, AnthropicConfig, ToolExecutor};
use crate::prompt::{PromptLoader, PromptRenderer};
use crate::sandbox::ForgeRunner;

pub type SharedAnalyzer = Arc<CachedAnalyzer<TargetAnalyzer>>;
pub type WorkerController = SessionController<SharedAnalyzer, ForgeRunner>;

/// Input checks that must fail before any work starts
pub fn preflight(session: &Session, config: &Config) -> Result<()> {
    check_required_binaries(&[config.sandbox.forge_binary.as_str()])?;

    if !session.generation.is_manual() {
        let key = std::env::var(&config.llm.api_key_env).unwrap_or_default();
        if key.trim().is_empty() {
            return Err(QuimeraError::Config(format!(
                "Please set the {} environment variable to use a model.",
                config.llm.api_key_env
            )));
        }
    }
    Ok(())
}

fn build_backend(
    session: &Session,
    config: &Config,
    analyzer: SharedAnalyzer,
    sink: Arc<dyn MessageSink>,
    cancel: CancellationSignal,
) -> Result<Box<dyn GenerationBackend>> {
    match &session.generation {
        GenerationSpec::Manual => Ok(Box::new(
            ManualBackend::new(session.working_dir.clone(), sink, cancel).with_poll_interval(config.manual.poll_interval()),
        )),
        GenerationSpec::Model {
            name,
            thinking_budget,
            attachment,
        } => {
            let llm_config =
                AnthropicConfig::with_model(name.clone()).with_timeout(Duration::from_millis(config.llm.timeout_ms));
            let client = AnthropicClient::from_env(&config.llm.api_key_env, llm_config)
                .map_err(|e| QuimeraError::Config(e.to_string()))?;

            let analyzer: Arc<dyn ContractAnalyzer> = analyzer;
            let tools = ToolExecutor::standard(analyzer, AnalysisRequest::for_session(session));

            let attachment = attachment.as_deref().map(Attachment::load).transpose()?;
            let options = AutomatedOptions {
                max_tokens: config.llm.max_tokens,
                thinking_budget: (*thinking_budget > 0).then_some(*thinking_budget),
                max_tool_rounds: config.llm.max_tool_rounds,
                system: None,
            };

            info!("Using model {} (thinking budget {})", name, thinking_budget);
            Ok(Box::new(
                AutomatedBackend::new(Arc::new(client), tools, options).with_attachment(attachment),
            ))
        }
    }
}

/// Assemble the production controller
pub fn build_controller(
    session: Session,
    config: &Config,
    sink: Arc<dyn MessageSink>,
    cancel: CancellationSignal,
) -> Result<WorkerController> {
    let explorer = session
        .explorer_api_key
        .as_ref()
        .map(|key| ExplorerAnalyzer::new(config.explorer.api_url.clone(), key.clone()))
        .transpose()?;
    let analyzer = Arc::new(CachedAnalyzer::new(
        TargetAnalyzer::new(explorer, LocalAnalyzer::new()?),
        Arc::new(AnalyzerCache::new()),
    ));

    let backend = build_backend(&session, config, analyzer.clone(), sink.clone(), cancel.clone())?;

    let loader = match &config.prompts.template_dir {
        Some(dir) => PromptLoader::with_overrides(dir),
        None => PromptLoader::embedded(),
    };
    let renderer = PromptRenderer::new(&loader)?;
    let runner = ForgeRunner::new(&config.sandbox)?;

    Ok(
        SessionController::new(session, analyzer, runner, backend, renderer, sink, cancel)
            .with_retry(RetryPolicy::from_config(&config.retry)),
    )
}

/// Tell the supervisor how the session ended.
///
/// A found exploit or an exhausted budget leaves the monitor open with a
/// modal; every other ending asks it to shut down.
pub fn report(result: &Result<SessionOutcome>, sink: &dyn MessageSink) {
    match result {
        Ok(outcome) if outcome.keeps_monitor_open() => {
            info!("{}", outcome);
            sink.send(Message::blocker(""));
            sink.send(Message::status(outcome.to_string()));
            sink.send(Message::open_modal(outcome.to_string()));
        }
        Ok(outcome) => {
            info!("{}", outcome);
            sink.send(Message::blocker(outcome.to_string()));
            sink.send(Message::Shutdown);
        }
        Err(e) => {
            error!("Worker failed: {}", e);
            eprintln!("quimera worker failed: {}", e);
            sink.send(Message::blocker(format!("Worker failed: {}", e)));
            sink.send(Message::Shutdown);
        }
    }
}

/// Build and run the session, reporting the result through `sink`.
///
/// The controller runs on its own task so a panic is caught here and
/// reported like any other process-fatal error.
pub async fn run_worker(
    session: Session,
    config: &Config,
    sink: Arc<dyn MessageSink>,
    cancel: CancellationSignal,
) -> Result<SessionOutcome> {
    let result = match build_controller(session, config, sink.clone(), cancel) {
        Ok(mut controller) => tokio::spawn(async move { controller.run().await })
            .await
            .unwrap_or_else(|e| Err(QuimeraError::Io(std::io::Error::other(format!("session task failed: {}", e))))),
        Err(e) => Err(e),
    };

    report(&result, sink.as_ref());
    result
}
