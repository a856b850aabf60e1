//! LLM-as-judge quality scoring.
//!
//! Five independent judgments per question, each asking the chat model for
//! a single JSON object with a 0.0-1.0 score. A failed judgment scores 0.0
//! and is logged; it never aborts the question.

use crate::error::{EvalError, Result};
use crate::llm::{Completion, Prompts};
use crate::retrieval::embeddings::truncate_chars;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Contexts shown to the judge.
pub const MAX_CONTEXTS: usize = 5;
/// Characters kept from each context.
pub const MAX_CONTEXT_CHARS: usize = 600;

const SYSTEM_PROMPT: &str =
    "You are a strict evaluator of retrieval quality. Respond with a single JSON object only.";

/// Scores for one question, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeScores {
    pub context_precision: f64,
    pub context_recall: f64,
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub semantic_similarity: f64,
}

impl JudgeScores {
    /// Mean of the five dimensions.
    pub fn overall(&self) -> f64 {
        (self.context_precision
            + self.context_recall
            + self.faithfulness
            + self.answer_relevancy
            + self.semantic_similarity)
            / 5.0
    }
}

/// What the judges look at.
#[derive(Debug, Clone, Copy)]
pub struct JudgeInput<'a> {
    pub question: &'a str,
    pub expected_answer: &'a str,
    /// Answer under evaluation.
    pub answer: &'a str,
    pub contexts: &'a [String],
}

/// Chat-model judge shared across questions.
#[derive(Clone)]
pub struct LlmJudge {
    client: Arc<dyn Completion>,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn Completion>) -> Self {
        Self { client }
    }

    /// Run all five judgments concurrently.
    pub async fn judge_all(&self, input: JudgeInput<'_>) -> JudgeScores {
        let contexts = format_contexts(input.contexts);

        let (
            context_precision,
            context_recall,
            faithfulness,
            answer_relevancy,
            semantic_similarity,
        ) = tokio::join!(
            self.context_precision(&input, &contexts),
            self.context_recall(&input, &contexts),
            self.faithfulness(&input, &contexts),
            self.answer_relevancy(&input),
            self.semantic_similarity(&input),
        );

        JudgeScores {
            context_precision,
            context_recall,
            faithfulness,
            answer_relevancy,
            semantic_similarity,
        }
    }

    pub async fn context_precision(&self, input: &JudgeInput<'_>, contexts: &str) -> f64 {
        let prompt = Prompts::context_precision()
            .replace("{question}", input.question)
            .replace("{expected_answer}", input.expected_answer)
            .replace("{contexts}", contexts);
        self.score("context_precision", &prompt, "precision").await
    }

    pub async fn context_recall(&self, input: &JudgeInput<'_>, contexts: &str) -> f64 {
        let prompt = Prompts::context_recall()
            .replace("{question}", input.question)
            .replace("{expected_answer}", input.expected_answer)
            .replace("{contexts}", contexts);
        self.score("context_recall", &prompt, "recall").await
    }

    pub async fn faithfulness(&self, input: &JudgeInput<'_>, contexts: &str) -> f64 {
        let prompt = Prompts::faithfulness()
            .replace("{question}", input.question)
            .replace("{answer}", input.answer)
            .replace("{contexts}", contexts);
        self.score("faithfulness", &prompt, "faithfulness").await
    }

    pub async fn answer_relevancy(&self, input: &JudgeInput<'_>) -> f64 {
        let prompt = Prompts::answer_relevancy()
            .replace("{question}", input.question)
            .replace("{answer}", input.answer);
        self.score("answer_relevancy", &prompt, "relevancy").await
    }

    pub async fn semantic_similarity(&self, input: &JudgeInput<'_>) -> f64 {
        let prompt = Prompts::semantic_similarity()
            .replace("{expected_answer}", input.expected_answer)
            .replace("{answer}", input.answer);
        self.score("semantic_similarity", &prompt, "similarity").await
    }

    async fn score(&self, dimension: &str, prompt: &str, key: &str) -> f64 {
        let result = match self.client.complete(Some(SYSTEM_PROMPT), prompt).await {
            Ok(response) => extract_score(&response, key),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(dimension, error = %e, "judge failed, scoring 0.0");
            0.0
        })
    }
}

/// Number and truncate contexts for the judge prompts.
pub fn format_contexts(contexts: &[String]) -> String {
    contexts
        .iter()
        .take(MAX_CONTEXTS)
        .enumerate()
        .map(|(i, ctx)| format!("[Context {}]:\n{}", i + 1, truncate_chars(ctx, MAX_CONTEXT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Pull `key` out of the first flat JSON object in `response` that names it,
/// clamped to `[0, 1]`.
pub fn extract_score(response: &str, key: &str) -> Result<f64> {
    let pattern = format!(r#"\{{[^{{}}]*"{}"[^{{}}]*\}}"#, regex::escape(key));
    let re = RegexBuilder::new(&pattern)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| EvalError::LlmParse(e.to_string()))?;

    let object = re
        .find(response)
        .ok_or_else(|| EvalError::LlmParse(format!("no JSON object with \"{}\"", key)))?;

    let value: serde_json::Value = serde_json::from_str(object.as_str())?;
    let score = match &value[key] {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| EvalError::LlmParse(format!("\"{}\" is not a number", key)))?;

    Ok(score.clamp(0.0, 1.0))
}
