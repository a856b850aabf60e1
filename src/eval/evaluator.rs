//! Batch evaluation runner.
//!
//! Questions run one at a time with a fixed pause between them. A failed
//! question is recorded with `success = false` and the run carries on.

use super::dataset::{Dataset, Question};
use super::judge::{JudgeInput, JudgeScores, LlmJudge};
use super::metrics::{PageMetrics, RetrievalMetrics};
use crate::error::Result;
use crate::retrieval::{Retrieval, Retriever, SearchResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Chunks previewed per result.
const PREVIEW_CHUNKS: usize = 3;
/// Characters kept in each preview.
const PREVIEW_CHARS: usize = 200;

/// Settings for a batch run.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Results scored per question.
    pub top_k: usize,
    /// Pause after each question.
    pub delay: Duration,
    /// Evaluate only the first N questions.
    pub max_items: Option<usize>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            delay: Duration::from_millis(100),
            max_items: None,
        }
    }
}

/// Latency breakdown for one question, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingMetrics {
    pub embedding_time_ms: f64,
    pub search_time_ms: f64,
    pub total_retrieval_time_ms: f64,
    /// Embedding time plus the search time amortised over `top_k` results.
    pub ttft_estimate_ms: f64,
    pub end_to_end_time_ms: f64,
}

impl TimingMetrics {
    fn from_retrieval(retrieval: &Retrieval, top_k: usize) -> Self {
        let total = retrieval.embedding_time_ms + retrieval.search_time_ms;
        Self {
            embedding_time_ms: retrieval.embedding_time_ms,
            search_time_ms: retrieval.search_time_ms,
            total_retrieval_time_ms: total,
            ttft_estimate_ms: retrieval.embedding_time_ms
                + retrieval.search_time_ms / top_k.max(1) as f64,
            end_to_end_time_ms: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostMetrics {
    pub embedding_tokens: u64,
}

/// Short view of a retrieved chunk kept in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPreview {
    pub page: Option<u32>,
    pub score: f64,
    pub source: String,
    pub preview: String,
}

impl ChunkPreview {
    fn from_result(result: &SearchResult) -> Self {
        let mut preview: String = result.content.chars().take(PREVIEW_CHARS).collect();
        if result.content.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        Self {
            page: result.page_number,
            score: result.score,
            source: result.source.clone(),
            preview,
        }
    }
}

/// Everything measured for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question_id: String,
    pub category: String,
    pub difficulty: String,
    pub question: String,
    pub expected_answer: String,
    pub expected_pages: Vec<u32>,
    pub expected_keywords: Vec<String>,
    pub retrieved_pages: Vec<u32>,
    pub top_chunks: Vec<ChunkPreview>,
    pub retrieval_metrics: RetrievalMetrics,
    pub page_metrics: PageMetrics,
    pub judge_scores: Option<JudgeScores>,
    pub timing_metrics: TimingMetrics,
    pub cost_metrics: CostMetrics,
    pub success: bool,
    pub error_message: Option<String>,
}

impl EvaluationResult {
    fn new(question: &Question) -> Self {
        Self {
            question_id: question.id.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty.clone(),
            question: question.question.clone(),
            expected_answer: question.expected_answer.clone(),
            expected_pages: question.expected_pages.clone(),
            expected_keywords: question.keywords.clone(),
            retrieved_pages: Vec::new(),
            top_chunks: Vec::new(),
            retrieval_metrics: RetrievalMetrics::default(),
            page_metrics: PageMetrics::default(),
            judge_scores: None,
            timing_metrics: TimingMetrics::default(),
            cost_metrics: CostMetrics::default(),
            success: true,
            error_message: None,
        }
    }
}

/// Output of [`Evaluator::run`].
#[derive(Debug, Clone)]
pub struct EvaluationRun {
    pub results: Vec<EvaluationResult>,
    pub total_time_secs: f64,
}

/// Runs a retriever (and optionally the judges) over a dataset.
pub struct Evaluator {
    retriever: Arc<dyn Retriever>,
    judge: Option<LlmJudge>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(retriever: Arc<dyn Retriever>, config: EvaluatorConfig) -> Self {
        Self {
            retriever,
            judge: None,
            config,
        }
    }

    /// Score every question with the LLM judges as well.
    pub fn with_judge(mut self, judge: LlmJudge) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn judges_enabled(&self) -> bool {
        self.judge.is_some()
    }

    pub fn describe_retriever(&self) -> String {
        self.retriever.describe()
    }

    /// Evaluate the dataset, in order.
    pub async fn run(&self, dataset: &Dataset) -> EvaluationRun {
        let start = Instant::now();
        let questions: Vec<&Question> = match self.config.max_items {
            Some(max) => dataset.questions.iter().take(max).collect(),
            None => dataset.questions.iter().collect(),
        };
        let total = questions.len();

        info!(
            dataset = dataset.name(),
            questions = total,
            top_k = self.config.top_k,
            judges = self.judges_enabled(),
            "starting evaluation"
        );

        let mut results = Vec::with_capacity(total);
        for (idx, question) in questions.into_iter().enumerate() {
            info!(
                "[{}/{}] {} ({}) {}",
                idx + 1,
                total,
                question.category.to_uppercase(),
                question.difficulty,
                question.id
            );
            results.push(self.evaluate_question(question).await);

            if !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        EvaluationRun {
            results,
            total_time_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Evaluate one question. Errors are folded into the result.
    pub async fn evaluate_question(&self, question: &Question) -> EvaluationResult {
        let mut result = EvaluationResult::new(question);
        let start = Instant::now();

        match self.score(question, &mut result).await {
            Ok(()) => {
                result.timing_metrics.end_to_end_time_ms = start.elapsed().as_secs_f64() * 1000.0;
                info!(
                    precision = result.retrieval_metrics.precision_at_k,
                    recall = result.retrieval_metrics.recall,
                    mrr = result.retrieval_metrics.mrr,
                    time_ms = result.timing_metrics.total_retrieval_time_ms.round(),
                    "question scored"
                );
            }
            Err(e) => {
                error!(question = %question.id, error = %e, "question failed");
                result.success = false;
                result.error_message = Some(e.to_string());
            }
        }

        result
    }

    async fn score(&self, question: &Question, result: &mut EvaluationResult) -> Result<()> {
        let retrieval = self
            .retriever
            .retrieve(&question.question, self.config.top_k)
            .await?;

        result.timing_metrics = TimingMetrics::from_retrieval(&retrieval, self.config.top_k);
        result.cost_metrics.embedding_tokens = retrieval.embedding_tokens;

        let results = &retrieval.results;
        result.retrieval_metrics = RetrievalMetrics::compute(results, question, self.config.top_k);
        result.page_metrics = PageMetrics::compute(results, &question.expected_pages);
        result.retrieved_pages = result.page_metrics.retrieved_pages.clone();
        result.top_chunks = results
            .iter()
            .take(PREVIEW_CHUNKS)
            .map(ChunkPreview::from_result)
            .collect();

        if let Some(judge) = &self.judge {
            let contexts: Vec<String> = results.iter().map(|r| r.content.clone()).collect();
            // The pipeline under test has no generator; the expected answer
            // stands in for the generated one.
            let scores = judge
                .judge_all(JudgeInput {
                    question: &question.question,
                    expected_answer: &question.expected_answer,
                    answer: &question.expected_answer,
                    contexts: &contexts,
                })
                .await;
            result.judge_scores = Some(scores);
        }

        Ok(())
    }
}

/// Judge-only result for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgedQuestion {
    pub question_id: String,
    pub category: String,
    pub difficulty: String,
    pub question: String,
    pub scores: JudgeScores,
    pub aggregate_score: f64,
}

/// Context handed to the judges when no retrieval is run.
pub fn synthetic_context(question: &Question) -> String {
    format!(
        "Keywords: {}. Expected pages: {:?}",
        question.keywords.join(", "),
        question.expected_pages
    )
}

/// Judge every question against a synthetic context built from its own
/// keywords and pages.
pub async fn run_judge_only(
    judge: &LlmJudge,
    dataset: &Dataset,
    max_items: Option<usize>,
    delay: Duration,
) -> Vec<JudgedQuestion> {
    let questions: Vec<&Question> = dataset
        .questions
        .iter()
        .take(max_items.unwrap_or(usize::MAX))
        .collect();
    let total = questions.len();
    let mut judged = Vec::with_capacity(total);

    for (idx, question) in questions.into_iter().enumerate() {
        info!("[{}/{}] judging {}", idx + 1, total, question.id);

        let contexts = vec![synthetic_context(question)];
        let scores = judge
            .judge_all(JudgeInput {
                question: &question.question,
                expected_answer: &question.expected_answer,
                answer: &question.expected_answer,
                contexts: &contexts,
            })
            .await;

        judged.push(JudgedQuestion {
            question_id: question.id.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty.clone(),
            question: question.question.clone(),
            aggregate_score: scores.overall(),
            scores,
        });

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    judged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::eval::dataset::sample_question;
    use crate::eval::judge::tests::KeyedJudge;
    use async_trait::async_trait;

    /// Returns canned results; fails for question text containing "fail".
    struct StaticRetriever {
        results: Vec<SearchResult>,
    }

    #[async_trait]
    impl Retriever for StaticRetriever {
        fn describe(&self) -> String {
            "static".to_string()
        }

        async fn retrieve(&self, query: &str, top_k: usize) -> Result<Retrieval> {
            if query.contains("fail") {
                return Err(EvalError::Search("rpc unavailable".to_string()));
            }
            Ok(Retrieval {
                results: self.results.iter().take(top_k).cloned().collect(),
                embedding_time_ms: 40.0,
                search_time_ms: 100.0,
                embedding_tokens: 12,
            })
        }
    }

    fn retriever() -> Arc<dyn Retriever> {
        Arc::new(StaticRetriever {
            results: vec![
                SearchResult::from_content("A tax group needs resident members.", Some(3)),
                SearchResult::from_content("Rates apply above the threshold.", Some(12)),
                SearchResult::from_content("x".repeat(500), Some(3)),
                SearchResult::from_content("Resident persons only.", Some(5)),
            ],
        })
    }

    fn config() -> EvaluatorConfig {
        EvaluatorConfig {
            top_k: 4,
            delay: Duration::ZERO,
            max_items: None,
        }
    }

    #[tokio::test]
    async fn test_evaluate_question() {
        let evaluator = Evaluator::new(retriever(), config());
        let result = evaluator
            .evaluate_question(&sample_question("q1", "easy", "groups"))
            .await;

        assert!(result.success);
        assert_eq!(result.retrieval_metrics.mrr, 1.0);
        assert_eq!(result.retrieval_metrics.precision_at_k, 0.5);
        assert_eq!(result.retrieved_pages, vec![3, 12, 5]);
        assert!(result.page_metrics.page_hit);
        assert_eq!(result.top_chunks.len(), 3);
        assert_eq!(result.top_chunks[2].preview.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(result.timing_metrics.total_retrieval_time_ms, 140.0);
        assert_eq!(result.timing_metrics.ttft_estimate_ms, 65.0);
        assert_eq!(result.cost_metrics.embedding_tokens, 12);
        assert!(result.judge_scores.is_none());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_run() {
        let mut dataset = Dataset::new("test");
        dataset.add_question(sample_question("q1", "easy", "groups"));
        let mut failing = sample_question("q2", "hard", "groups");
        failing.question = "this will fail".to_string();
        dataset.add_question(failing);
        dataset.add_question(sample_question("q3", "medium", "rates"));

        let run = Evaluator::new(retriever(), config()).run(&dataset).await;

        assert_eq!(run.results.len(), 3);
        assert!(run.results[0].success);
        assert!(!run.results[1].success);
        assert!(
            run.results[1]
                .error_message
                .as_deref()
                .unwrap()
                .contains("rpc unavailable")
        );
        assert!(run.results[2].success);
        assert_eq!(run.results[2].question_id, "q3");
    }

    #[tokio::test]
    async fn test_max_items_and_judges() {
        let mut dataset = Dataset::new("test");
        for id in ["q1", "q2", "q3"] {
            dataset.add_question(sample_question(id, "easy", "groups"));
        }

        let evaluator = Evaluator::new(
            retriever(),
            EvaluatorConfig {
                max_items: Some(2),
                ..config()
            },
        )
        .with_judge(LlmJudge::new(Arc::new(KeyedJudge)));
        let run = evaluator.run(&dataset).await;

        assert_eq!(run.results.len(), 2);
        let scores = run.results[0].judge_scores.unwrap();
        assert_eq!(scores.context_precision, 0.9);
    }

    #[test]
    fn test_synthetic_context() {
        let question = sample_question("q1", "easy", "groups");
        assert_eq!(
            synthetic_context(&question),
            "Keywords: tax group, resident. Expected pages: [3]"
        );
    }

    #[tokio::test]
    async fn test_run_judge_only() {
        let mut dataset = Dataset::new("test");
        dataset.add_question(sample_question("q1", "easy", "groups"));
        dataset.add_question(sample_question("q2", "hard", "rates"));

        let judge = LlmJudge::new(Arc::new(KeyedJudge));
        let judged = run_judge_only(&judge, &dataset, Some(1), Duration::ZERO).await;

        assert_eq!(judged.len(), 1);
        assert_eq!(judged[0].question_id, "q1");
        assert!((judged[0].aggregate_score - judged[0].scores.overall()).abs() < 1e-12);
    }
}
