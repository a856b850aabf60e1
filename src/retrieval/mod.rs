//! Retrieval clients.
//!
//! Every retriever turns a question into a ranked list of [`SearchResult`]s:
//! - [`HybridRetriever`]: embeddings API + hosted `hybrid_search` RPC, with
//!   optional query expansion and LLM re-ranking
//! - [`LocalRetriever`]: cosine similarity over a pre-computed chunk file

pub mod embeddings;
pub mod expansion;
pub mod hybrid;
pub mod local;
pub mod rerank;

pub use embeddings::{Embedder, Embedding, EmbeddingClient};
pub use expansion::expand_query;
pub use hybrid::{HybridRetriever, HybridSearchClient};
pub use local::{ChunkIndex, IndexedChunk, LocalRetriever, cosine_similarity};
pub use rerank::Reranker;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A ranked chunk returned by a retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk text.
    pub content: String,
    /// Source file name.
    #[serde(default)]
    pub file_name: String,
    /// Fused, similarity or re-rank score depending on the stage that
    /// produced it.
    pub score: f64,
    /// Position of the chunk inside its file.
    #[serde(default)]
    pub chunk_index: usize,
    /// Page the chunk starts on, when known.
    #[serde(default)]
    pub page_number: Option<u32>,
    /// Which search produced the row (`hybrid`, `semantic`, `keyword`, `local`).
    #[serde(default)]
    pub source: String,
    /// Free-form metadata from the store.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SearchResult {
    /// Build a result from content alone (useful for tests and synthetic
    /// contexts).
    pub fn from_content(content: impl Into<String>, page_number: Option<u32>) -> Self {
        Self {
            content: content.into(),
            file_name: String::new(),
            score: 0.0,
            chunk_index: 0,
            page_number,
            source: String::new(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Results of one retrieval plus the cost of producing them.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub results: Vec<SearchResult>,
    pub embedding_time_ms: f64,
    pub search_time_ms: f64,
    pub embedding_tokens: u64,
}

/// Anything that can rank chunks for a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Human-readable description recorded in reports.
    fn describe(&self) -> String;

    /// Retrieve at most `top_k` results for `query`, best first.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Retrieval>;
}
