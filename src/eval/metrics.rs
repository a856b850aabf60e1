//! Keyword-based information-retrieval metrics.
//!
//! A result is relevant when its content contains at least one expected
//! keyword (case-insensitive substring match). Every metric lands in
//! `[0, 1]`; zero denominators yield fixed defaults instead of NaN.

use super::dataset::Question;
use crate::retrieval::SearchResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Expected keywords, lowercased and de-duplicated.
#[derive(Debug, Clone)]
pub struct Keywords {
    terms: Vec<String>,
}

impl Keywords {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let mut seen = HashSet::new();
        let terms = keywords
            .iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| seen.insert(k.clone()))
            .collect();
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of distinct keywords found in `text`.
    pub fn count_in(&self, text: &str) -> usize {
        let text = text.to_lowercase();
        self.terms.iter().filter(|k| text.contains(k.as_str())).count()
    }

    /// Whether `text` contains any keyword.
    pub fn any_in(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.terms.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Relevant results in the top `k`, divided by `k`.
pub fn precision_at_k(results: &[SearchResult], keywords: &Keywords, k: usize) -> f64 {
    if results.is_empty() || keywords.is_empty() || k == 0 {
        return 0.0;
    }
    let relevant = results
        .iter()
        .take(k)
        .filter(|r| keywords.any_in(&r.content))
        .count();
    relevant as f64 / k as f64
}

/// Fraction of keywords found anywhere in the results.
pub fn recall(results: &[SearchResult], keywords: &Keywords) -> f64 {
    if keywords.is_empty() {
        return 1.0;
    }
    let all_content = results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    keywords.count_in(&all_content) as f64 / keywords.len() as f64
}

pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// Reciprocal rank of the first relevant result.
pub fn mrr(results: &[SearchResult], keywords: &Keywords) -> f64 {
    results
        .iter()
        .position(|r| keywords.any_in(&r.content))
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

/// NDCG over the top `k`, graded by the share of keywords each result holds.
///
/// The ideal ranking assumes all `k` slots have relevance 1.
pub fn ndcg_at_k(results: &[SearchResult], keywords: &Keywords, k: usize) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let dcg: f64 = results
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, r)| {
            let relevance = keywords.count_in(&r.content) as f64 / keywords.len() as f64;
            relevance / discount(i)
        })
        .sum();
    let idcg: f64 = (0..k).map(|i| 1.0 / discount(i)).sum();

    if idcg > 0.0 { dcg / idcg } else { 0.0 }
}

fn discount(rank: usize) -> f64 {
    ((rank + 2) as f64).log2()
}

/// Mean average precision, normalised by the keyword count and capped at 1.
pub fn map_score(results: &[SearchResult], keywords: &Keywords) -> f64 {
    if results.is_empty() || keywords.is_empty() {
        return 0.0;
    }

    let mut relevant = 0usize;
    let mut sum = 0.0;
    for (i, result) in results.iter().enumerate() {
        if keywords.any_in(&result.content) {
            relevant += 1;
            sum += relevant as f64 / (i + 1) as f64;
        }
    }

    (sum / keywords.len() as f64).min(1.0)
}

/// 1 when any result is relevant.
pub fn hit_rate(results: &[SearchResult], keywords: &Keywords) -> f64 {
    if mrr(results, keywords) > 0.0 { 1.0 } else { 0.0 }
}

/// Share of expected pages that appear among the results.
pub fn page_accuracy(results: &[SearchResult], expected_pages: &[u32]) -> f64 {
    let expected: HashSet<u32> = expected_pages.iter().copied().collect();
    let retrieved: HashSet<u32> = results.iter().filter_map(|r| r.page_number).collect();
    if expected.is_empty() || retrieved.is_empty() {
        return 0.0;
    }
    expected.intersection(&retrieved).count() as f64 / expected.len() as f64
}

/// Fraction of keywords present in the top result alone.
pub fn keyword_coverage(results: &[SearchResult], keywords: &Keywords) -> f64 {
    match results.first() {
        Some(top) if !keywords.is_empty() => {
            keywords.count_in(&top.content) as f64 / keywords.len() as f64
        }
        _ => 0.0,
    }
}

/// Distinct page numbers per result; results without a page count as one
/// shared "unknown" page.
pub fn chunk_diversity(results: &[SearchResult]) -> f64 {
    if results.len() <= 1 {
        return 1.0;
    }
    let pages: HashSet<Option<u32>> = results.iter().map(|r| r.page_number).collect();
    pages.len() as f64 / results.len() as f64
}

/// Per-question retrieval metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
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
}

impl RetrievalMetrics {
    /// Score `results` against a question's keywords and pages.
    pub fn compute(results: &[SearchResult], question: &Question, k: usize) -> Self {
        let keywords = Keywords::new(&question.keywords);
        let precision = precision_at_k(results, &keywords, k);
        let recall = recall(results, &keywords);

        Self {
            precision_at_k: precision,
            recall,
            f1_score: f1_score(precision, recall),
            mrr: mrr(results, &keywords),
            ndcg_at_k: ndcg_at_k(results, &keywords, k),
            map_score: map_score(results, &keywords),
            hit_rate: hit_rate(results, &keywords),
            page_accuracy: page_accuracy(results, &question.expected_pages),
            keyword_coverage: keyword_coverage(results, &keywords),
            chunk_diversity: chunk_diversity(results),
        }
    }
}

/// Page-level view of a retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Distinct pages in result order.
    pub retrieved_pages: Vec<u32>,
    /// Any retrieved page is expected.
    pub page_hit: bool,
    /// Expected pages among the retrieved pages.
    pub page_precision: f64,
    /// Reciprocal rank of the first result on an expected page.
    pub page_mrr: f64,
}

impl PageMetrics {
    pub fn compute(results: &[SearchResult], expected_pages: &[u32]) -> Self {
        let expected: HashSet<u32> = expected_pages.iter().copied().collect();

        let mut retrieved_pages = Vec::new();
        for page in results.iter().filter_map(|r| r.page_number) {
            if !retrieved_pages.contains(&page) {
                retrieved_pages.push(page);
            }
        }

        let correct = retrieved_pages.iter().filter(|p| expected.contains(p)).count();
        let page_precision = if retrieved_pages.is_empty() {
            0.0
        } else {
            correct as f64 / retrieved_pages.len() as f64
        };
        let page_mrr = results
            .iter()
            .position(|r| r.page_number.is_some_and(|p| expected.contains(&p)))
            .map(|i| 1.0 / (i + 1) as f64)
            .unwrap_or(0.0);

        Self {
            retrieved_pages,
            page_hit: correct > 0,
            page_precision,
            page_mrr,
        }
    }
}
