//! Generation Backend Adapter
//!
//! One contract, `request(prompt) -> text`, over two variants:
//! - [`AutomatedBackend`]: a model conversation with callable tools
//! - [`ManualBackend`]: a human pastes the answer into a scratch file
//!
//! Transient failures are reported, never retried here; the session
//! controller owns the retry loop (see [`RetryPolicy`]).

mod automated;
mod manual;
mod retry;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::LlmError;

pub use automated::{Attachment, AutomatedBackend, AutomatedOptions};
pub use manual::{ANSWER_FILE, ANSWER_INSTRUCTIONS, ManualBackend, PROMPT_FILE};
pub use retry::RetryPolicy;

/// Why a generation request produced no text
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Worth retrying: rate limits, overloaded backend, transport failures
    #[error("Transient generation error: {0}")]
    Transient(String),

    /// Retrying cannot help (bad credentials, malformed request)
    #[error("Generation failed: {0}")]
    Fatal(String),

    /// The session was cancelled while waiting
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        if err.is_retryable() {
            GenerationError::Transient(err.to_string())
        } else {
            GenerationError::Fatal(err.to_string())
        }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Obtain a response for `prompt`. May block indefinitely.
    async fn request(&mut self, prompt: &str) -> Result<String, GenerationError>;

    /// Short label for status messages
    fn name(&self) -> &str;
}
