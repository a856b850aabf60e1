//! Client for an OpenAI-compatible `/v1/embeddings` endpoint.

use crate::config::EmbeddingConfig;
use crate::error::{EvalError, Result};
use crate::llm::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest input, in characters, sent to the endpoint.
pub const MAX_INPUT_CHARS: usize = 32_000;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u64,
}

/// A query embedding and the tokens billed for it.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub tokens: u64,
}

/// Turns query text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name recorded in reports.
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Embeddings API client.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.config.api_base.trim_end_matches('/'))
    }

    async fn request(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: truncate_chars(text, MAX_INPUT_CHARS),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(EvalError::Embedding(format!("({}): {}", status, message)));
        }

        parse_embedding_response(&body)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.request(text).await
    }
}

fn parse_embedding_response(body: &str) -> Result<Embedding> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EvalError::Embedding(format!("invalid response: {}", e)))?;

    let tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
    let vector = parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| EvalError::Embedding("no embedding in response".to_string()))?;

    Ok(Embedding { vector, tokens })
}

/// Cut `text` to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        let client = EmbeddingClient::new(EmbeddingConfig {
            api_base: "https://api.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/embeddings");
    }

    #[test]
    fn test_parse_embedding_response() {
        let body = r#"{"data":[{"embedding":[0.1,0.2,0.3]}],"usage":{"prompt_tokens":7,"total_tokens":7}}"#;
        let embedding = parse_embedding_response(body).unwrap();
        assert_eq!(embedding.vector.len(), 3);
        assert_eq!(embedding.tokens, 7);
    }

    #[test]
    fn test_parse_empty_embedding_response() {
        let body = r#"{"data":[]}"#;
        assert!(matches!(
            parse_embedding_response(body),
            Err(EvalError::Embedding(_))
        ));
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
