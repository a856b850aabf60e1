//! Hybrid search against a hosted database RPC.
//!
//! The store exposes two remote procedures under `{url}/rest/v1/rpc/`:
//! `hybrid_search` (semantic + full-text fused with reciprocal rank fusion)
//! and `semantic_search` (vector similarity only). The hybrid call is tried
//! first; any failure falls back to semantic search.

use super::{Embedder, Retrieval, Retriever, Reranker, SearchResult, expand_query};
use crate::config::SearchConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct HybridSearchRequest<'a> {
    query_text: &'a str,
    query_embedding: &'a [f32],
    p_user_id: &'a str,
    match_count: usize,
    semantic_weight: f64,
    keyword_weight: f64,
    rrf_k: u32,
}

#[derive(Debug, Serialize)]
struct SemanticSearchRequest<'a> {
    query_embedding: &'a [f32],
    p_user_id: &'a str,
    match_count: usize,
    min_similarity: f64,
}

/// Row returned by either RPC. Hybrid rows carry `rrf_score` and
/// `search_type`; semantic rows carry `similarity`.
#[derive(Debug, Deserialize)]
struct SearchRow {
    content: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    rrf_score: Option<f64>,
    #[serde(default)]
    similarity: Option<f64>,
    #[serde(default)]
    chunk_index: Option<usize>,
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    search_type: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl SearchRow {
    fn into_result(self, default_source: &str) -> SearchResult {
        SearchResult {
            content: self.content,
            file_name: self.file_name.unwrap_or_default(),
            score: self.rrf_score.or(self.similarity).unwrap_or(0.0),
            chunk_index: self.chunk_index.unwrap_or(0),
            page_number: self.page_number,
            source: self
                .search_type
                .unwrap_or_else(|| default_source.to_string()),
            metadata: self.metadata,
        }
    }
}

/// Thin client for the two search RPCs.
#[derive(Clone)]
pub struct HybridSearchClient {
    client: Client,
    config: SearchConfig,
}

impl HybridSearchClient {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.config.url.trim_end_matches('/'), name)
    }

    async fn call<B: Serialize>(&self, name: &str, body: &B) -> Result<Vec<SearchRow>> {
        let response = self
            .client
            .post(self.rpc_url(name))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(EvalError::Search(format!("{} ({}): {}", name, status, text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| EvalError::Search(format!("{}: invalid response: {}", name, e)))
    }

    /// Run `hybrid_search`.
    pub async fn hybrid(&self, query: &str, embedding: &[f32]) -> Result<Vec<SearchResult>> {
        let request = HybridSearchRequest {
            query_text: query,
            query_embedding: embedding,
            p_user_id: &self.config.user_id,
            match_count: self.config.match_count,
            semantic_weight: self.config.semantic_weight,
            keyword_weight: self.config.keyword_weight,
            rrf_k: self.config.rrf_k,
        };
        let rows = self.call("hybrid_search", &request).await?;
        Ok(rows.into_iter().map(|r| r.into_result("hybrid")).collect())
    }

    /// Run `semantic_search`.
    pub async fn semantic(&self, embedding: &[f32]) -> Result<Vec<SearchResult>> {
        let request = SemanticSearchRequest {
            query_embedding: embedding,
            p_user_id: &self.config.user_id,
            match_count: self.config.match_count,
            min_similarity: self.config.min_similarity,
        };
        let rows = self.call("semantic_search", &request).await?;
        Ok(rows.into_iter().map(|r| r.into_result("semantic")).collect())
    }

    /// Hybrid search, falling back to semantic search on any failure.
    pub async fn search(&self, query: &str, embedding: &[f32]) -> Result<Vec<SearchResult>> {
        match self.hybrid(query, embedding).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!(error = %e, "hybrid search failed, falling back to semantic search");
                self.semantic(embedding).await
            }
        }
    }
}

/// Full remote pipeline: expansion, embedding, hybrid search, re-ranking.
pub struct HybridRetriever {
    embeddings: Arc<dyn Embedder>,
    search: HybridSearchClient,
    reranker: Option<Reranker>,
    expand_queries: bool,
}

impl HybridRetriever {
    pub fn new(embeddings: Arc<dyn Embedder>, search: HybridSearchClient) -> Self {
        Self {
            embeddings,
            search,
            reranker: None,
            expand_queries: true,
        }
    }

    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_query_expansion(mut self, enabled: bool) -> Self {
        self.expand_queries = enabled;
        self
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    fn describe(&self) -> String {
        let config = self.search.config();
        format!(
            "hybrid_search (semantic {:.1} / keyword {:.1}, rrf_k {}, {} candidates, embeddings {}{}{})",
            config.semantic_weight,
            config.keyword_weight,
            config.rrf_k,
            config.match_count,
            self.embeddings.model(),
            if self.expand_queries { ", query expansion" } else { "" },
            if self.reranker.is_some() { ", LLM re-ranking" } else { "" },
        )
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Retrieval> {
        let search_query = if self.expand_queries {
            expand_query(query)
        } else {
            query.to_string()
        };
        if search_query != query {
            debug!(expanded = %search_query, "expanded query");
        }

        let start = Instant::now();
        let embedding = self.embeddings.embed(&search_query).await?;
        let embedding_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let mut results = self.search.search(&search_query, &embedding.vector).await?;
        if let Some(reranker) = &self.reranker {
            results = reranker.rerank(query, results, top_k).await;
        }
        results.truncate(top_k);
        let search_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        Ok(Retrieval {
            results,
            embedding_time_ms,
            search_time_ms,
            embedding_tokens: embedding.tokens,
        })
    }
}
