//! Evaluation of a retrieval pipeline against a question/answer dataset.
//!
//! - [`dataset`]: question file loading
//! - [`metrics`]: keyword and page based IR metrics
//! - [`judge`]: LLM-as-judge quality scores
//! - [`evaluator`]: sequential batch runner
//! - [`report`]: aggregation, JSON report and console tables

pub mod dataset;
pub mod evaluator;
pub mod judge;
pub mod metrics;
pub mod report;

pub use dataset::{Dataset, DatasetMetadata, Question};
pub use evaluator::{
    EvaluationResult, EvaluationRun, Evaluator, EvaluatorConfig, JudgedQuestion, run_judge_only,
};
pub use judge::{JudgeInput, JudgeScores, LlmJudge};
pub use metrics::{Keywords, PageMetrics, RetrievalMetrics};
pub use report::{EvaluationReport, JudgeReport, ReportConfiguration};
