//! LLM integration module.
//!
//! Provides an OpenAI-compatible client for chat completions, the
//! [`Completion`] seam the judges and re-ranker are written against, and the
//! prompts they send.

mod client;
mod prompts;

pub use client::{LlmClient, LlmResponse, Message, Role, TokenUsage};
pub(crate) use client::ApiError;
pub use prompts::Prompts;

use crate::error::Result;
use async_trait::async_trait;

/// A single-turn text completion.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Send one user message with an optional system prompt and return the
    /// model's text.
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String>;
}
