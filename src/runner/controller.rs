//! Session controller - the render/execute/classify/generate loop.
//!
//! Each pass:
//! 1. Renders the test contract from the current `IterationState`
//! 2. Runs it in the sandbox and keeps the full output as the trace
//! 3. Persists the iteration record
//! 4. Classifies the trace; a pass ends the session, an ambiguous trace
//!    aborts it, a failure continues while budget remains
//! 5. Requests the next candidate from the generation backend (transient
//!    errors retried without bound) and folds the parsed fields into the
//!    next state

use std::fmt;
use std::sync::Arc;

use log::{error, info, warn};

use crate::analyzer::{AnalysisRequest, ContractAnalyzer};
use crate::artifact;
use crate::backend::{GenerationBackend, GenerationError, RetryPolicy};
use crate::coordination::CancellationSignal;
use crate::domain::{IterationState, Outcome, Session, classify, failure_reason};
use crate::error::{QuimeraError, Result};
use crate::ipc::{Message, MessageSink};
use crate::prompt::{INITIAL_EXPLOIT_CODE, PromptRenderer};
use crate::sandbox::{SandboxJob, SandboxRunner};
use crate::storage::{IterationLog, IterationRecord};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The entry point passed at `iteration`
    Succeeded { iteration: u32 },
    /// Every iteration up to the budget failed
    Exhausted { iterations: u32, last_failure: String },
    /// No contract metadata could be obtained
    AnalyzerFailed { target: String },
    /// A trace matched none of the known markers
    Aborted { iteration: u32 },
    /// The cancellation signal was observed
    Cancelled { iteration: u32 },
}

impl SessionOutcome {
    pub fn exploit_found(&self) -> bool {
        matches!(self, SessionOutcome::Succeeded { .. })
    }

    /// Outcomes the operator should read before the monitor closes
    pub fn keeps_monitor_open(&self) -> bool {
        matches!(self, SessionOutcome::Succeeded { .. } | SessionOutcome::Exhausted { .. })
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Succeeded { iteration } => {
                write!(f, "Test passed at iteration {}, profit was found!", iteration)
            }
            SessionOutcome::Exhausted {
                iterations,
                last_failure,
            } => write!(
                f,
                "No working exploit after {} iteration(s). Last failure: {}",
                iterations, last_failure
            ),
            SessionOutcome::AnalyzerFailed { target } => {
                write!(f, "Failed to fetch contract information for {}", target)
            }
            SessionOutcome::Aborted { iteration } => write!(
                f,
                "Test result at iteration {} is not clear, please check the output",
                iteration
            ),
            SessionOutcome::Cancelled { iteration } => write!(f, "Cancelled during iteration {}", iteration),
        }
    }
}

/// Prompt/response pair that produced the state about to be executed
struct Exchange {
    prompt: String,
    response: String,
}

pub struct SessionController<A, R>
where
    A: ContractAnalyzer,
    R: SandboxRunner,
{
    session: Session,
    analyzer: A,
    runner: R,
    backend: Box<dyn GenerationBackend>,
    renderer: PromptRenderer,
    log: IterationLog,
    sink: Arc<dyn MessageSink>,
    cancel: CancellationSignal,
    retry: RetryPolicy,
    generations: u32,
}

impl<A, R> SessionController<A, R>
where
    A: ContractAnalyzer,
    R: SandboxRunner,
{
    pub fn new(
        session: Session,
        analyzer: A,
        runner: R,
        backend: Box<dyn GenerationBackend>,
        renderer: PromptRenderer,
        sink: Arc<dyn MessageSink>,
        cancel: CancellationSignal,
    ) -> Self {
        let log = IterationLog::new(&session);
        Self {
            session,
            analyzer,
            runner,
            backend,
            renderer,
            log,
            sink,
            cancel,
            retry: RetryPolicy::default(),
            generations: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Successful generation requests so far
    pub fn generations(&self) -> u32 {
        self.generations
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the session to completion.
    ///
    /// Errors are process-fatal (sandbox could not be driven, templates
    /// failed, fatal backend error); every session-level ending is an
    /// `Ok(SessionOutcome)`.
    pub async fn run(&mut self) -> Result<SessionOutcome> {
        let budget = self.session.iterations;
        self.sink.send(Message::network_info(self.session.network_info()));
        self.sink
            .send(Message::change_directory(self.session.target_dir().to_string_lossy()));

        self.sink.send(Message::status("Fetching contract information"));
        let request = AnalysisRequest::for_session(&self.session);
        let Some(info) = self.analyzer.analyze(&request).await else {
            let outcome = SessionOutcome::AnalyzerFailed {
                target: self.session.target.to_string(),
            };
            error!("{}", outcome);
            return Ok(outcome);
        };
        info!("Analyzed {}", info.describe());

        let constraints = self.renderer.constraints(&self.session.valuable_token.to_uppercase())?;
        let mut state = IterationState::initial(&self.session, &info, constraints, INITIAL_EXPLOIT_CODE)?;
        let mut exchange: Option<Exchange> = None;

        loop {
            let index = state.iteration;
            if self.cancel.is_cancelled() {
                info!("Cancellation observed before iteration {}", index);
                return Ok(SessionOutcome::Cancelled { iteration: index });
            }

            self.sink
                .send(Message::status(format!("Iteration {}/{}: running test", index, budget)));
            let source = self.renderer.test_source(&state, info.base_template.as_deref())?;
            state = state.with_test_code(source.clone());

            let job = SandboxJob::for_session(&self.session, index, source);
            let trace = self.runner.run(&job).await?;
            state = state.with_trace(trace);

            let record = match exchange.take() {
                Some(Exchange { prompt, response }) => IterationRecord::new(index, prompt, Some(response)),
                None => IterationRecord::new(index, self.renderer.initial_prompt(&state)?, None),
            };
            self.log.append(&record)?;

            let outcome = classify(&state.trace);
            info!("Iteration {} outcome: {}", index, outcome);
            self.sink
                .send(Message::editor_status(format!("Iteration {}: {}", index, outcome)));

            if !outcome.should_continue() {
                if outcome == Outcome::Pass {
                    return Ok(SessionOutcome::Succeeded { iteration: index });
                }
                error!(
                    "Trace of iteration {} matched no known marker, aborting:\n{}",
                    index, state.trace
                );
                return Ok(SessionOutcome::Aborted { iteration: index });
            }

            if index >= budget {
                return Ok(SessionOutcome::Exhausted {
                    iterations: index,
                    last_failure: failure_reason(&state.trace),
                });
            }

            let prompt = if index == 0 {
                record.prompt
            } else {
                self.renderer.next_prompt(&state)?
            };

            self.sink.send(Message::status(format!(
                "Iteration {}/{}: waiting for {}",
                index + 1,
                budget,
                self.backend.name()
            )));
            let response = match self.request_with_retry(&prompt).await {
                Ok(response) => response,
                Err(GenerationError::Cancelled) => {
                    return Ok(SessionOutcome::Cancelled { iteration: index + 1 });
                }
                Err(e) => return Err(QuimeraError::Generation(e.to_string())),
            };
            self.generations += 1;

            let fields = artifact::parse(&response);
            if fields.execute_exploit_code.is_empty() {
                warn!("Response for iteration {} has no exploit code", index + 1);
            }
            state = state.next(fields);
            exchange = Some(Exchange { prompt, response });
        }
    }

    /// Request a response, retrying transient failures until cancelled.
    async fn request_with_retry(&mut self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }

            attempt += 1;
            match self.backend.request(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!("Generation attempt {} failed: {}", attempt, e);
                    self.sink.send(Message::blocker(format!(
                        "Error getting response from {} (attempt {}), retrying",
                        self.backend.name(),
                        attempt
                    )));
                    if self.retry.backoff(&self.cancel).await {
                        return Err(GenerationError::Cancelled);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
