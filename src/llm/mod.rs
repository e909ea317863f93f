//! LLM Client Layer - Anthropic API integration and callable tools
//!
//! This module provides:
//! - Message and content block types
//! - LlmClient trait for API abstraction
//! - AnthropicClient implementation
//! - Tools the model may call while answering

pub mod anthropic;
pub mod client;
pub mod tools;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, MockLlmClient};
pub use tools::{Tool, ToolExecutor, ToolResult};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, DocumentSource, LlmError, Message, Role, StopReason,
    ToolCall, ToolDefinition, Usage,
};
