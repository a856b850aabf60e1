//! RAG Evaluator - retrieval quality evaluation for a hybrid search pipeline.
//!
//! Runs a fixed question/answer dataset through a retrieval pipeline
//! (embeddings API + hosted `hybrid_search` RPC, or cosine search over a
//! local chunk export), scores the results with keyword and page based IR
//! metrics and optional LLM judges, and aggregates everything into a report.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_evaluator::{
//!     config::Config,
//!     eval::{Dataset, EvaluationReport, Evaluator, EvaluatorConfig, ReportConfiguration},
//!     retrieval::{EmbeddingClient, HybridRetriever, HybridSearchClient},
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate_embedding()?;
//!     config.validate_search()?;
//!
//!     let dataset = Dataset::load_json(Path::new("qa_dataset.json"))?;
//!     let retriever = HybridRetriever::new(
//!         Arc::new(EmbeddingClient::new(config.embedding.clone())?),
//!         HybridSearchClient::new(config.search.clone())?,
//!     );
//!
//!     let evaluator = Evaluator::new(Arc::new(retriever), EvaluatorConfig::default());
//!     let configuration = ReportConfiguration {
//!         top_k: 5,
//!         llm_judges_enabled: false,
//!         embedding_model: config.embedding.model.clone(),
//!         retriever: evaluator.describe_retriever(),
//!     };
//!     let run = evaluator.run(&dataset).await;
//!
//!     let report = EvaluationReport::build(&dataset.metadata, run, configuration, 0.02);
//!     report.print_summary();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **retrieval**: query expansion, embeddings client, hybrid RPC client
//!   with semantic fallback, LLM re-ranker, local cosine retriever
//! - **eval**: dataset, metrics, judges, batch evaluator, report
//! - **llm**: OpenAI-compatible chat client and prompts
//! - **persistence**: chunk index and report files
//! - **security**: pre-write secret and sensitive-path check

pub mod config;
pub mod error;
pub mod eval;
pub mod llm;
pub mod persistence;
pub mod retrieval;
pub mod security;

// Re-export commonly used types
pub use config::Config;
pub use error::{EvalError, Result};
pub use eval::{Dataset, EvaluationReport, Evaluator, LlmJudge};
pub use llm::LlmClient;
pub use retrieval::{Retriever, SearchResult};
