//! Cosine-similarity search over a pre-computed chunk file.

use super::{Embedder, Retrieval, Retriever, SearchResult};
use crate::error::Result;
use async_trait::async_trait;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// A chunk with its stored embedding.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct IndexedChunk {
    pub content: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub contextual_header: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

/// All chunks of an indexed document, in file order.
///
/// Serialized as a bare JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Encode, Decode)]
#[serde(transparent)]
pub struct ChunkIndex {
    pub chunks: Vec<IndexedChunk>,
}

impl ChunkIndex {
    pub fn new(chunks: Vec<IndexedChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Rank chunks by cosine similarity to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, cosine_similarity(query, &chunk.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, score)| {
                let chunk = &self.chunks[i];
                SearchResult {
                    content: chunk.content.clone(),
                    file_name: String::new(),
                    score: f64::from(score),
                    chunk_index: i,
                    page_number: chunk.page_number,
                    source: "local".to_string(),
                    metadata: serde_json::json!({
                        "section": chunk.section,
                        "contextual_header": chunk.contextual_header,
                    }),
                }
            })
            .collect()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Retriever over a [`ChunkIndex`] held in memory.
pub struct LocalRetriever {
    index: ChunkIndex,
    embeddings: Arc<dyn Embedder>,
}

impl LocalRetriever {
    pub fn new(index: ChunkIndex, embeddings: Arc<dyn Embedder>) -> Self {
        Self { index, embeddings }
    }
}

#[async_trait]
impl Retriever for LocalRetriever {
    fn describe(&self) -> String {
        format!(
            "local cosine search ({} chunks, embeddings {})",
            self.index.len(),
            self.embeddings.model()
        )
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Retrieval> {
        let start = Instant::now();
        let embedding = self.embeddings.embed(query).await?;
        let embedding_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let results = self.index.search(&embedding.vector, top_k);
        let search_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        Ok(Retrieval {
            results,
            embedding_time_ms,
            search_time_ms,
            embedding_tokens: embedding.tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Embedding;

    /// Embeds every query as the same fixed vector.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> Result<Embedding> {
            Ok(Embedding {
                vector: self.0.clone(),
                tokens: 10,
            })
        }
    }

    fn chunk(content: &str, page: u32, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            content: content.to_string(),
            page_number: Some(page),
            embedding,
            contextual_header: None,
            section: Some("Tax groups".to_string()),
        }
    }

    fn sample_index() -> ChunkIndex {
        ChunkIndex::new(vec![
            chunk("Rates apply above the threshold.", 12, vec![0.0, 1.0]),
            chunk("A tax group needs resident members.", 3, vec![1.0, 0.0]),
            chunk("Groups and rates.", 4, vec![0.7, 0.7]),
        ])
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let results = sample_index().search(&[1.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].page_number, Some(3));
        assert_eq!(results[0].chunk_index, 1);
        assert_eq!(results[1].page_number, Some(4));
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].source, "local");
        assert_eq!(results[0].metadata["section"], "Tax groups");
    }

    #[test]
    fn test_index_deserializes_from_array() {
        let index: ChunkIndex = serde_json::from_str(
            r#"[{"content": "text", "page_number": 2, "embedding": [0.1, 0.2]}]"#,
        )
        .unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.chunks[0].section.is_none());
    }

    #[tokio::test]
    async fn test_local_retriever() {
        let retriever =
            LocalRetriever::new(sample_index(), Arc::new(FixedEmbedder(vec![0.0, 1.0])));
        let retrieval = retriever.retrieve("What is the rate?", 1).await.unwrap();

        assert_eq!(retrieval.results.len(), 1);
        assert_eq!(retrieval.results[0].page_number, Some(12));
        assert_eq!(retrieval.embedding_tokens, 10);
        assert!(retriever.describe().contains("3 chunks"));
    }
}
