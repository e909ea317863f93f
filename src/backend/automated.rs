//! Automated generation through a model conversation.
//!
//! The conversation persists for the whole session. Each `request` appends
//! one user turn, runs tool rounds until the model stops asking for tools,
//! and commits the exchange to the history only once it completed.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info, warn};

use super::{GenerationBackend, GenerationError};
use crate::error::{QuimeraError, Result};
use crate::llm::{CompletionRequest, ContentBlock, LlmClient, Message, ToolExecutor, Usage};

/// File handed to the model together with the first prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Text { name: String, content: String },
    Pdf { name: String, data: String },
}

impl Attachment {
    /// PDFs are sent as base64 documents, anything else as text
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            let bytes = std::fs::read(path)?;
            Ok(Attachment::Pdf {
                name,
                data: STANDARD.encode(bytes),
            })
        } else {
            let content = std::fs::read_to_string(path)
                .map_err(|e| QuimeraError::Config(format!("Attachment {} is not text: {}", path.display(), e)))?;
            Ok(Attachment::Text { name, content })
        }
    }

    fn to_block(&self) -> ContentBlock {
        match self {
            Attachment::Text { name, content } => ContentBlock::text(format!("Attached file `{}`:\n\n{}", name, content)),
            Attachment::Pdf { data, .. } => ContentBlock::pdf(data.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutomatedOptions {
    pub max_tokens: u32,
    pub thinking_budget: Option<u32>,
    pub max_tool_rounds: u32,
    pub system: Option<String>,
}

impl Default for AutomatedOptions {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            thinking_budget: None,
            max_tool_rounds: 16,
            system: None,
        }
    }
}

pub struct AutomatedBackend<L: LlmClient> {
    llm: Arc<L>,
    tools: ToolExecutor,
    options: AutomatedOptions,
    history: Vec<Message>,
    attachment: Option<Attachment>,
    usage: Usage,
}

impl<L: LlmClient> AutomatedBackend<L> {
    pub fn new(llm: Arc<L>, tools: ToolExecutor, options: AutomatedOptions) -> Self {
        Self {
            llm,
            tools,
            options,
            history: Vec::new(),
            attachment: None,
            usage: Usage::default(),
        }
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    fn user_turn(&self, prompt: &str) -> Message {
        let mut blocks = Vec::new();
        if self.history.is_empty()
            && let Some(attachment) = &self.attachment
        {
            blocks.push(attachment.to_block());
        }
        blocks.push(ContentBlock::text(prompt));
        Message::user_blocks(blocks)
    }

    fn build_request(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest {
            system: self.options.system.clone(),
            messages: messages.to_vec(),
            tools: self.tools.definitions(),
            max_tokens: self.options.max_tokens,
            thinking_budget: self.options.thinking_budget,
        }
    }
}

#[async_trait]
impl<L: LlmClient + 'static> GenerationBackend for AutomatedBackend<L> {
    async fn request(&mut self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let mut messages = self.history.clone();
        messages.push(self.user_turn(prompt));

        let mut rounds = 0u32;
        loop {
            let request = self.build_request(&messages);
            let response = self.llm.complete(&request).await.map_err(|e| {
                warn!("Model request failed: {}", e);
                GenerationError::from(e)
            })?;
            self.usage.add(&response.usage);

            // Assistant turns go back verbatim, thinking signatures included
            messages.push(Message::assistant_blocks(response.content.clone()));

            if !response.stop_reason.needs_continuation() {
                let text = response.text();
                info!(
                    "Model answered after {} tool round(s), {} tokens so far",
                    rounds,
                    self.usage.total()
                );
                self.history = messages;
                return Ok(text);
            }

            rounds += 1;
            if rounds > self.options.max_tool_rounds {
                return Err(GenerationError::Transient(format!(
                    "model exceeded {} tool rounds",
                    self.options.max_tool_rounds
                )));
            }

            let calls = response.tool_calls();
            debug!(
                "Tool round {}: {}",
                rounds,
                calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            );
            let results = self.tools.execute_all(&calls).await;
            messages.push(Message::user_blocks(results));
        }
    }

    fn name(&self) -> &str {
        self.llm.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tools::BigNumberTool;
    use crate::llm::{CompletionResponse, LlmError, MockLlmClient, Role, StopReason};
    use serde_json::json;
    use tempfile::TempDir;

    fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: Usage::new(10, 5),
        }
    }

    fn tool_response(id: &str) -> CompletionResponse {
        CompletionResponse {
            content: vec![
                ContentBlock::Thinking {
                    thinking: "need a sum".to_string(),
                    signature: "sig".to_string(),
                },
                ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: "add_big_numbers".to_string(),
                    input: json!({"a": "1", "b": "2"}),
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: Usage::new(10, 5),
        }
    }

    fn tools() -> ToolExecutor {
        let mut executor = ToolExecutor::new();
        for tool in BigNumberTool::all() {
            executor.add_tool(Box::new(tool));
        }
        executor
    }

    #[tokio::test]
    async fn test_history_spans_requests() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_response(text_response("first"));
        llm.push_response(text_response("second"));
        let mut backend = AutomatedBackend::new(llm.clone(), tools(), AutomatedOptions::default());

        assert_eq!(backend.request("p1").await.unwrap(), "first");
        assert_eq!(backend.request("p2").await.unwrap(), "second");

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[1].role, Role::Assistant);
        assert_eq!(backend.history().len(), 4);
        assert_eq!(backend.usage().total(), 30);
    }

    #[tokio::test]
    async fn test_tool_round_replays_thinking_and_results() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_response(tool_response("call-1"));
        llm.push_response(text_response("<executeExploitCode>x</executeExploitCode>"));
        let options = AutomatedOptions {
            thinking_budget: Some(2048),
            ..Default::default()
        };
        let mut backend = AutomatedBackend::new(llm.clone(), tools(), options);

        let text = backend.request("go").await.unwrap();
        assert!(text.contains("executeExploitCode"));

        let requests = llm.requests();
        assert_eq!(requests[0].thinking_budget, Some(2048));
        assert_eq!(requests[0].tools.len(), 3);

        let second = &requests[1].messages;
        assert!(matches!(second[1].content[0], ContentBlock::Thinking { .. }));
        match &second[2].content[0] {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "call-1");
                assert_eq!(content, "3");
                assert!(!is_error);
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_attachment_only_on_first_request() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("audit.md");
        std::fs::write(&path, "reentrancy in withdraw()").unwrap();

        let llm = Arc::new(MockLlmClient::new());
        llm.push_response(text_response("a"));
        llm.push_response(text_response("b"));
        let mut backend = AutomatedBackend::new(llm.clone(), tools(), AutomatedOptions::default())
            .with_attachment(Some(Attachment::load(&path).unwrap()));

        backend.request("p1").await.unwrap();
        backend.request("p2").await.unwrap();

        let requests = llm.requests();
        assert_eq!(requests[0].messages[0].content.len(), 2);
        assert_eq!(requests[1].messages[2].content.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_request_leaves_history_untouched() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_error(LlmError::ApiError {
            status: 529,
            message: "Overloaded".to_string(),
        });
        llm.push_response(text_response("ok"));
        let mut backend = AutomatedBackend::new(llm.clone(), tools(), AutomatedOptions::default());

        let err = backend.request("p").await.unwrap_err();
        assert!(err.is_transient());
        assert!(backend.history().is_empty());

        assert_eq!(backend.request("p").await.unwrap(), "ok");
        assert_eq!(backend.history().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_limit_is_transient() {
        let llm = Arc::new(MockLlmClient::new());
        for i in 0..3 {
            llm.push_response(tool_response(&format!("call-{}", i)));
        }
        let options = AutomatedOptions {
            max_tool_rounds: 2,
            ..Default::default()
        };
        let mut backend = AutomatedBackend::new(llm, tools(), options);

        let err = backend.request("p").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_pdf_attachment_is_base64() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("paper.PDF");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        match Attachment::load(&path).unwrap() {
            Attachment::Pdf { name, data } => {
                assert_eq!(name, "paper.PDF");
                assert_eq!(data, "JVBERi0xLjQ=");
            }
            other => panic!("expected pdf, got {:?}", other),
        }
    }
}
