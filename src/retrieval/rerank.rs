//! LLM re-ranking of search candidates.

use super::SearchResult;
use super::embeddings::truncate_chars;
use crate::error::{EvalError, Result};
use crate::llm::{Completion, Prompts};
use std::sync::Arc;
use tracing::warn;

/// Characters of each candidate shown to the model.
const PREVIEW_CHARS: usize = 300;

/// Asks a chat model to score candidates 0-10 and reorders by that score.
#[derive(Clone)]
pub struct Reranker {
    client: Arc<dyn Completion>,
}

impl Reranker {
    pub fn new(client: Arc<dyn Completion>) -> Self {
        Self { client }
    }

    /// Re-rank `results` for `query` and keep the best `top_k`.
    ///
    /// Nothing is sent when there are no more candidates than `top_k`. On
    /// any failure the original order is kept, truncated to `top_k`.
    pub async fn rerank(
        &self,
        query: &str,
        mut results: Vec<SearchResult>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        if results.len() <= top_k {
            return results;
        }

        match self.scores(query, &results).await {
            Ok(scores) => {
                for (result, score) in results.iter_mut().zip(scores) {
                    result.score = score / 10.0;
                }
                results.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            Err(e) => warn!(error = %e, "re-ranking failed, keeping search order"),
        }

        results.truncate(top_k);
        results
    }

    async fn scores(&self, query: &str, results: &[SearchResult]) -> Result<Vec<f64>> {
        let documents = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[{}] {}...", i, truncate_chars(&r.content, PREVIEW_CHARS)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = Prompts::rerank()
            .replace("{query}", query)
            .replace("{documents}", &documents);

        let response = self.client.complete(None, &prompt).await?;
        parse_scores(&response, results.len())
    }
}

/// Parse the first JSON array of numbers in `response`; it must score every
/// candidate.
fn parse_scores(response: &str, expected: usize) -> Result<Vec<f64>> {
    let start = response
        .find('[')
        .ok_or_else(|| EvalError::LlmParse("no JSON array in re-rank response".to_string()))?;
    let end = response[start..]
        .find(']')
        .map(|i| start + i + 1)
        .ok_or_else(|| EvalError::LlmParse("unterminated JSON array".to_string()))?;

    let scores: Vec<f64> = serde_json::from_str(&response[start..end])?;
    if scores.len() != expected {
        return Err(EvalError::LlmParse(format!(
            "expected {} scores, got {}",
            expected,
            scores.len()
        )));
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: String,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Completion for Canned {
        async fn complete(&self, _system: Option<&str>, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn candidates(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| SearchResult::from_content(format!("chunk {}", i), Some(i as u32)))
            .collect()
    }

    #[tokio::test]
    async fn test_rerank_reorders_by_score() {
        let reranker = Reranker::new(Canned::new("Scores: [2, 9, 5]"));
        let results = reranker.rerank("q", candidates(3), 2).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "chunk 1");
        assert!((results[0].score - 0.9).abs() < 1e-9);
        assert_eq!(results[1].content, "chunk 2");
    }

    #[tokio::test]
    async fn test_rerank_length_mismatch_keeps_order() {
        let reranker = Reranker::new(Canned::new("[9, 1]"));
        let results = reranker.rerank("q", candidates(4), 2).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "chunk 0");
        assert_eq!(results[1].content, "chunk 1");
    }

    #[tokio::test]
    async fn test_rerank_skipped_when_few_candidates() {
        let client = Canned::new("[1, 2]");
        let reranker = Reranker::new(client.clone());
        let results = reranker.rerank("q", candidates(2), 5).await;

        assert_eq!(results.len(), 2);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parse_scores_rejects_garbage() {
        assert!(parse_scores("no numbers here", 1).is_err());
        assert!(parse_scores("[\"a\"]", 1).is_err());
        assert_eq!(parse_scores("[1.5]", 1).unwrap(), vec![1.5]);
    }
}
