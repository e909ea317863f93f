//! LlmClient trait and a scripted mock for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse, LlmError};

/// A model endpoint. Each call is independent; conversation state lives in
/// the request's message list.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

/// Replays queued responses and records every request it receives
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: CompletionResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response));
        }
    }

    pub fn push_error(&self, error: LlmError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        self.responses
            .lock()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("no scripted response".to_string())))
    }

    fn model(&self) -> &str {
        "mock"
    }
}
