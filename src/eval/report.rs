//! Aggregation of per-question results into a report.
//!
//! Every mean is taken over successful results only; failed questions are
//! counted in the metadata and kept in `detailed_results`.

use super::dataset::DatasetMetadata;
use super::evaluator::{EvaluationResult, EvaluationRun, JudgedQuestion};
use super::judge::JudgeScores;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value at percentile `p` (0-100) of `values`; 0 on empty input.
///
/// Uses the sorted element at index `floor(n * p / 100)`, clamped to the
/// last element.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let index = (sorted.len() as f64 * p / 100.0) as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Mean retrieval metrics over a group of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub precision_at_k: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub mrr: f64,
    pub ndcg_at_k: f64,
    pub map_score: f64,
    pub hit_rate: f64,
    pub page_accuracy: f64,
    pub keyword_coverage: f64,
    pub chunk_diversity: f64,
    pub page_hit_rate: f64,
    pub page_precision: f64,
    pub page_mrr: f64,
    pub avg_retrieval_time_ms: f64,
}

impl MetricSummary {
    pub fn from_results(results: &[&EvaluationResult]) -> Self {
        let m = |f: fn(&EvaluationResult) -> f64| mean(results.iter().map(|r| f(r)));

        Self {
            count: results.len(),
            precision_at_k: m(|r| r.retrieval_metrics.precision_at_k),
            recall: m(|r| r.retrieval_metrics.recall),
            f1_score: m(|r| r.retrieval_metrics.f1_score),
            mrr: m(|r| r.retrieval_metrics.mrr),
            ndcg_at_k: m(|r| r.retrieval_metrics.ndcg_at_k),
            map_score: m(|r| r.retrieval_metrics.map_score),
            hit_rate: m(|r| r.retrieval_metrics.hit_rate),
            page_accuracy: m(|r| r.retrieval_metrics.page_accuracy),
            keyword_coverage: m(|r| r.retrieval_metrics.keyword_coverage),
            chunk_diversity: m(|r| r.retrieval_metrics.chunk_diversity),
            page_hit_rate: m(|r| if r.page_metrics.page_hit { 1.0 } else { 0.0 }),
            page_precision: m(|r| r.page_metrics.page_precision),
            page_mrr: m(|r| r.page_metrics.page_mrr),
            avg_retrieval_time_ms: m(|r| r.timing_metrics.total_retrieval_time_ms),
        }
    }
}

/// Mean judge scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeSummary {
    pub count: usize,
    pub context_precision: f64,
    pub context_recall: f64,
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub semantic_similarity: f64,
    pub overall: f64,
}

impl JudgeSummary {
    pub fn from_scores(scores: &[JudgeScores]) -> Self {
        let m = |f: fn(&JudgeScores) -> f64| mean(scores.iter().map(f));

        Self {
            count: scores.len(),
            context_precision: m(|s| s.context_precision),
            context_recall: m(|s| s.context_recall),
            faithfulness: m(|s| s.faithfulness),
            answer_relevancy: m(|s| s.answer_relevancy),
            semantic_similarity: m(|s| s.semantic_similarity),
            overall: m(JudgeScores::overall),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub avg_embedding_time_ms: f64,
    pub avg_search_time_ms: f64,
    pub avg_total_retrieval_time_ms: f64,
    pub avg_ttft_ms: f64,
    pub p50_retrieval_time_ms: f64,
    pub p95_retrieval_time_ms: f64,
    pub p99_retrieval_time_ms: f64,
    pub min_retrieval_time_ms: f64,
    pub max_retrieval_time_ms: f64,
}

impl TimingSummary {
    /// Labeled rows of the console latency table.
    pub fn rows(&self) -> [(&'static str, f64); 9] {
        [
            ("Avg embedding", self.avg_embedding_time_ms),
            ("Avg search", self.avg_search_time_ms),
            ("Avg retrieval", self.avg_total_retrieval_time_ms),
            ("Avg TTFT estimate", self.avg_ttft_ms),
            ("P50 retrieval", self.p50_retrieval_time_ms),
            ("P95 retrieval", self.p95_retrieval_time_ms),
            ("P99 retrieval", self.p99_retrieval_time_ms),
            ("Min retrieval", self.min_retrieval_time_ms),
            ("Max retrieval", self.max_retrieval_time_ms),
        ]
    }

    pub fn from_results(results: &[&EvaluationResult]) -> Self {
        let totals: Vec<f64> = results
            .iter()
            .map(|r| r.timing_metrics.total_retrieval_time_ms)
            .collect();

        Self {
            avg_embedding_time_ms: mean(results.iter().map(|r| r.timing_metrics.embedding_time_ms)),
            avg_search_time_ms: mean(results.iter().map(|r| r.timing_metrics.search_time_ms)),
            avg_total_retrieval_time_ms: mean(totals.iter().copied()),
            avg_ttft_ms: mean(results.iter().map(|r| r.timing_metrics.ttft_estimate_ms)),
            p50_retrieval_time_ms: percentile(&totals, 50.0),
            p95_retrieval_time_ms: percentile(&totals, 95.0),
            p99_retrieval_time_ms: percentile(&totals, 99.0),
            min_retrieval_time_ms: totals.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_retrieval_time_ms: totals.iter().copied().reduce(f64::max).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_embedding_tokens: u64,
    pub cost_per_million_tokens_usd: f64,
    pub cost_per_query_usd: f64,
    pub projected_cost_per_1000_queries_usd: f64,
}

impl CostSummary {
    pub fn from_results(results: &[&EvaluationResult], cost_per_million_tokens: f64) -> Self {
        let total_embedding_tokens: u64 =
            results.iter().map(|r| r.cost_metrics.embedding_tokens).sum();
        let total_cost = total_embedding_tokens as f64 / 1_000_000.0 * cost_per_million_tokens;
        let (cost_per_query_usd, projected) = if results.is_empty() {
            (0.0, 0.0)
        } else {
            let per_query = total_cost / results.len() as f64;
            (per_query, per_query * 1000.0)
        };

        Self {
            total_embedding_tokens,
            cost_per_million_tokens_usd: cost_per_million_tokens,
            cost_per_query_usd,
            projected_cost_per_1000_queries_usd: projected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    #[serde(flatten)]
    pub dataset: DatasetMetadata,
    pub evaluation_timestamp: DateTime<Local>,
    pub total_questions: usize,
    pub successful_evaluations: usize,
    pub failed_evaluations: usize,
    pub total_evaluation_time_seconds: f64,
}

/// Settings the run was made with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfiguration {
    pub top_k: usize,
    pub llm_judges_enabled: bool,
    pub embedding_model: String,
    pub retriever: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub retrieval_metrics: MetricSummary,
    pub judge_metrics: Option<JudgeSummary>,
    pub timing_metrics: TimingSummary,
    pub cost_metrics: CostSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Breakdown {
    pub by_difficulty: BTreeMap<String, MetricSummary>,
    pub by_category: BTreeMap<String, MetricSummary>,
}

fn group_by<'a>(
    results: &[&'a EvaluationResult],
    key: fn(&EvaluationResult) -> &str,
) -> BTreeMap<String, MetricSummary> {
    let mut groups: BTreeMap<String, Vec<&'a EvaluationResult>> = BTreeMap::new();
    for &r in results {
        groups.entry(key(r).to_string()).or_default().push(r);
    }
    groups
        .into_iter()
        .map(|(name, members)| (name, MetricSummary::from_results(&members)))
        .collect()
}

/// Full evaluation report, written as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metadata: ReportMetadata,
    pub configuration: ReportConfiguration,
    pub summary: ReportSummary,
    pub breakdown: Breakdown,
    pub detailed_results: Vec<EvaluationResult>,
}

impl EvaluationReport {
    pub fn build(
        dataset: &DatasetMetadata,
        run: EvaluationRun,
        configuration: ReportConfiguration,
        cost_per_million_tokens: f64,
    ) -> Self {
        let successful: Vec<&EvaluationResult> = run.results.iter().filter(|r| r.success).collect();

        let judge_scores: Vec<JudgeScores> =
            successful.iter().filter_map(|r| r.judge_scores).collect();
        let judge_metrics = configuration
            .llm_judges_enabled
            .then(|| JudgeSummary::from_scores(&judge_scores));

        let summary = ReportSummary {
            retrieval_metrics: MetricSummary::from_results(&successful),
            judge_metrics,
            timing_metrics: TimingSummary::from_results(&successful),
            cost_metrics: CostSummary::from_results(&successful, cost_per_million_tokens),
        };
        let breakdown = Breakdown {
            by_difficulty: group_by(&successful, |r| r.difficulty.as_str()),
            by_category: group_by(&successful, |r| r.category.as_str()),
        };

        let metadata = ReportMetadata {
            dataset: dataset.clone(),
            evaluation_timestamp: Local::now(),
            total_questions: run.results.len(),
            successful_evaluations: successful.len(),
            failed_evaluations: run.results.len() - successful.len(),
            total_evaluation_time_seconds: run.total_time_secs,
        };

        Self {
            metadata,
            configuration,
            summary,
            breakdown,
            detailed_results: run.results,
        }
    }

    /// Print the summary tables to stdout.
    pub fn print_summary(&self) {
        let meta = &self.metadata;
        let rm = &self.summary.retrieval_metrics;
        let tm = &self.summary.timing_metrics;
        let cm = &self.summary.cost_metrics;

        println!("\n{}", "=".repeat(64));
        println!("{:^64}", "RAG PIPELINE EVALUATION REPORT");
        println!("{}", "=".repeat(64));
        println!("Dataset:    {}", meta.dataset.name);
        println!("Retriever:  {}", self.configuration.retriever);
        println!(
            "Questions:  {} ({} ok, {} failed) in {:.1}s",
            meta.total_questions,
            meta.successful_evaluations,
            meta.failed_evaluations,
            meta.total_evaluation_time_seconds
        );

        section("RETRIEVAL METRICS");
        row_pct(&format!("Precision@{}", self.configuration.top_k), rm.precision_at_k);
        row_pct("Recall", rm.recall);
        row_pct("F1 score", rm.f1_score);
        row_num("MRR", rm.mrr);
        row_num(&format!("NDCG@{}", self.configuration.top_k), rm.ndcg_at_k);
        row_num("MAP", rm.map_score);
        row_pct("Hit rate", rm.hit_rate);
        row_pct("Page accuracy", rm.page_accuracy);
        row_pct("Page hit rate", rm.page_hit_rate);
        row_num("Page MRR", rm.page_mrr);
        row_pct("Keyword coverage (top-1)", rm.keyword_coverage);
        row_pct("Chunk diversity", rm.chunk_diversity);

        if let Some(jm) = &self.summary.judge_metrics {
            print_judge_summary(jm);
        }

        section("LATENCY (ms)");
        for (label, value) in tm.rows() {
            row_ms(label, value);
        }

        section("COST");
        println!("{:<40} {:>20}", "Embedding tokens", cm.total_embedding_tokens);
        println!("{:<40} {:>20.6}", "Cost per query (USD)", cm.cost_per_query_usd);
        println!(
            "{:<40} {:>20.4}",
            "Projected per 1000 queries (USD)", cm.projected_cost_per_1000_queries_usd
        );

        section("BY DIFFICULTY");
        print_group_table(ordered_difficulties(&self.breakdown.by_difficulty));
        section("BY CATEGORY");
        print_group_table(self.breakdown.by_category.iter().collect());
        println!("{}\n", "=".repeat(64));
    }
}

/// Known difficulty levels first, in increasing order, then the rest.
fn ordered_difficulties(
    groups: &BTreeMap<String, MetricSummary>,
) -> Vec<(&String, &MetricSummary)> {
    const ORDER: [&str; 3] = ["easy", "medium", "hard"];
    let mut rows: Vec<_> = groups.iter().collect();
    rows.sort_by_key(|(name, _)| {
        ORDER
            .iter()
            .position(|o| o == name)
            .unwrap_or(ORDER.len())
    });
    rows
}

fn section(title: &str) {
    println!("{}", "-".repeat(64));
    println!("{}", title);
    println!("{}", "-".repeat(64));
}

fn row_pct(label: &str, value: f64) {
    println!("{:<40} {:>19.1}%", label, value * 100.0);
}

fn row_num(label: &str, value: f64) {
    println!("{:<40} {:>20.3}", label, value);
}

fn row_ms(label: &str, value: f64) {
    println!("{:<40} {:>20.0}", label, value);
}

fn print_group_table(rows: Vec<(&String, &MetricSummary)>) {
    println!(
        "{:<18} {:>6} {:>8} {:>8} {:>7} {:>7} {:>8}",
        "Group", "Count", "P@K", "Recall", "MRR", "NDCG", "Time ms"
    );
    for (name, s) in rows {
        println!(
            "{:<18} {:>6} {:>7.1}% {:>7.1}% {:>7.3} {:>7.3} {:>8.0}",
            name,
            s.count,
            s.precision_at_k * 100.0,
            s.recall * 100.0,
            s.mrr,
            s.ndcg_at_k,
            s.avg_retrieval_time_ms
        );
    }
}

fn print_judge_summary(jm: &JudgeSummary) {
    section("LLM-JUDGED QUALITY");
    row_pct("Context precision", jm.context_precision);
    row_pct("Context recall", jm.context_recall);
    row_pct("Faithfulness", jm.faithfulness);
    row_pct("Answer relevancy", jm.answer_relevancy);
    row_pct("Semantic similarity", jm.semantic_similarity);
    row_pct("Overall", jm.overall);
}

/// Report for a judge-only run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeReport {
    #[serde(flatten)]
    pub dataset: DatasetMetadata,
    pub evaluation_timestamp: DateTime<Local>,
    pub total_questions: usize,
    pub total_time_seconds: f64,
    pub judge_model: String,
    pub aggregate_scores: JudgeSummary,
    pub detailed_results: Vec<JudgedQuestion>,
}

impl JudgeReport {
    pub fn build(
        dataset: &DatasetMetadata,
        judged: Vec<JudgedQuestion>,
        judge_model: &str,
        total_time_seconds: f64,
    ) -> Self {
        let scores: Vec<JudgeScores> = judged.iter().map(|j| j.scores).collect();
        Self {
            dataset: dataset.clone(),
            evaluation_timestamp: Local::now(),
            total_questions: judged.len(),
            total_time_seconds,
            judge_model: judge_model.to_string(),
            aggregate_scores: JudgeSummary::from_scores(&scores),
            detailed_results: judged,
        }
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(64));
        println!("{:^64}", "LLM-JUDGED EVALUATION SUMMARY");
        println!("{}", "=".repeat(64));
        println!("Dataset:    {}", self.dataset.name);
        println!("Judge:      {}", self.judge_model);
        println!(
            "Questions:  {} in {:.1}s",
            self.total_questions, self.total_time_seconds
        );
        print_judge_summary(&self.aggregate_scores);
        println!("{}\n", "=".repeat(64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::dataset::sample_question;
    use crate::eval::evaluator::{CostMetrics, TimingMetrics};
    use crate::eval::metrics::{PageMetrics, RetrievalMetrics};

    fn result(
        id: &str,
        difficulty: &str,
        category: &str,
        precision: f64,
        time_ms: f64,
        success: bool,
    ) -> EvaluationResult {
        let q = sample_question(id, difficulty, category);
        EvaluationResult {
            question_id: q.id,
            category: q.category,
            difficulty: q.difficulty,
            question: q.question,
            expected_answer: q.expected_answer,
            expected_pages: q.expected_pages,
            expected_keywords: q.keywords,
            retrieved_pages: vec![3],
            top_chunks: Vec::new(),
            retrieval_metrics: RetrievalMetrics {
                precision_at_k: precision,
                mrr: precision,
                ..Default::default()
            },
            page_metrics: PageMetrics {
                page_hit: precision > 0.5,
                ..Default::default()
            },
            judge_scores: None,
            timing_metrics: TimingMetrics {
                total_retrieval_time_ms: time_ms,
                ..Default::default()
            },
            cost_metrics: CostMetrics {
                embedding_tokens: 500_000,
            },
            success,
            error_message: (!success).then(|| "boom".to_string()),
        }
    }

    fn configuration(judges: bool) -> ReportConfiguration {
        ReportConfiguration {
            top_k: 5,
            llm_judges_enabled: judges,
            embedding_model: "text-embedding-3-small".to_string(),
            retriever: "static".to_string(),
        }
    }

    #[test]
    fn test_percentile() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&values, 50.0), 6.0);
        assert_eq!(percentile(&values, 95.0), 10.0);
        assert_eq!(percentile(&values, 99.0), 10.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 50.0), 2.0);
    }

    #[test]
    fn test_summary_excludes_failures() {
        let run = EvaluationRun {
            results: vec![
                result("q1", "easy", "groups", 0.4, 100.0, true),
                result("q2", "hard", "groups", 0.8, 300.0, true),
                result("q3", "hard", "rates", 0.0, 0.0, false),
            ],
            total_time_secs: 1.5,
        };
        let report = EvaluationReport::build(
            &DatasetMetadata::default(),
            run,
            configuration(false),
            0.02,
        );

        assert_eq!(report.metadata.total_questions, 3);
        assert_eq!(report.metadata.successful_evaluations, 2);
        assert_eq!(report.metadata.failed_evaluations, 1);
        assert!((report.summary.retrieval_metrics.precision_at_k - 0.6).abs() < 1e-9);
        assert_eq!(report.summary.retrieval_metrics.count, 2);
        assert_eq!(report.summary.retrieval_metrics.page_hit_rate, 0.5);
        assert!(report.summary.judge_metrics.is_none());
        assert_eq!(report.detailed_results.len(), 3);
        assert!(!report.breakdown.by_category.contains_key("rates"));
    }

    #[test]
    fn test_group_means() {
        let results = [
            result("q1", "easy", "groups", 0.2, 100.0, true),
            result("q2", "easy", "rates", 0.6, 200.0, true),
            result("q3", "hard", "groups", 1.0, 300.0, true),
        ];
        let refs: Vec<&EvaluationResult> = results.iter().collect();

        let by_difficulty = group_by(&refs, |r| r.difficulty.as_str());
        assert_eq!(by_difficulty["easy"].count, 2);
        assert!((by_difficulty["easy"].precision_at_k - 0.4).abs() < 1e-9);
        assert!((by_difficulty["easy"].avg_retrieval_time_ms - 150.0).abs() < 1e-9);
        assert_eq!(by_difficulty["hard"].precision_at_k, 1.0);

        let by_category = group_by(&refs, |r| r.category.as_str());
        assert!((by_category["groups"].mrr - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_timing_and_cost() {
        let results = [
            result("q1", "easy", "groups", 0.2, 100.0, true),
            result("q2", "easy", "groups", 0.2, 300.0, true),
        ];
        let refs: Vec<&EvaluationResult> = results.iter().collect();

        let timing = TimingSummary::from_results(&refs);
        assert_eq!(timing.avg_total_retrieval_time_ms, 200.0);
        assert_eq!(timing.p50_retrieval_time_ms, 300.0);
        assert_eq!(timing.min_retrieval_time_ms, 100.0);
        assert_eq!(timing.max_retrieval_time_ms, 300.0);

        let rows = timing.rows();
        assert_eq!(rows[7], ("Min retrieval", 100.0));
        assert_eq!(rows[8], ("Max retrieval", 300.0));
        assert!(rows.iter().all(|(label, _)| !label.is_empty()));

        let cost = CostSummary::from_results(&refs, 0.02);
        assert_eq!(cost.total_embedding_tokens, 1_000_000);
        assert!((cost.cost_per_query_usd - 0.01).abs() < 1e-12);
        assert!((cost.projected_cost_per_1000_queries_usd - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summaries_are_zero() {
        assert_eq!(MetricSummary::from_results(&[]), MetricSummary::default());
        assert_eq!(TimingSummary::from_results(&[]), TimingSummary::default());
        assert_eq!(CostSummary::from_results(&[], 0.02).cost_per_query_usd, 0.0);
        assert_eq!(JudgeSummary::from_scores(&[]).overall, 0.0);
    }

    #[test]
    fn test_judge_summary_and_report_json() {
        let mut scored = result("q1", "easy", "groups", 0.5, 100.0, true);
        scored.judge_scores = Some(JudgeScores {
            context_precision: 1.0,
            context_recall: 0.5,
            faithfulness: 1.0,
            answer_relevancy: 0.5,
            semantic_similarity: 1.0,
        });
        let run = EvaluationRun {
            results: vec![scored],
            total_time_secs: 0.2,
        };
        let mut dataset = DatasetMetadata::default();
        dataset.name = "tax_qa".to_string();
        dataset
            .extra
            .insert("version".to_string(), serde_json::json!("1.0"));

        let report = EvaluationReport::build(&dataset, run, configuration(true), 0.02);
        let judge = report.summary.judge_metrics.as_ref().unwrap();
        assert!((judge.overall - 0.8).abs() < 1e-9);

        let json = serde_json::to_value(&report).unwrap();
        for key in ["metadata", "configuration", "summary", "breakdown", "detailed_results"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["metadata"]["name"], "tax_qa");
        assert_eq!(json["metadata"]["version"], "1.0");
        assert_eq!(json["breakdown"]["by_difficulty"]["easy"]["count"], 1);
    }

    #[test]
    fn test_difficulty_order() {
        let mut groups = BTreeMap::new();
        for name in ["hard", "expert", "easy", "medium"] {
            groups.insert(name.to_string(), MetricSummary::default());
        }
        let names: Vec<&str> = ordered_difficulties(&groups)
            .into_iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["easy", "medium", "hard", "expert"]);
    }
}
