//! Configuration for the evaluator.
//!
//! Supports a YAML config file, a `.env` file and environment variables.
//! Environment variables take precedence over config file values; CLI flags
//! are applied on top by the binary.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const OPENAI_API_BASE: &str = "https://api.openai.com";

/// Chat-completion settings used by the judges and the re-ranker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Model name (e.g., "gpt-4o-mini")
    pub model: String,

    /// Maximum tokens for response
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: OPENAI_API_BASE.to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            temperature: 0.0,
            timeout_secs: 90,
        }
    }
}

/// Embeddings endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    /// Price in USD per one million embedding tokens, used for cost estimates.
    pub cost_per_million_tokens: f64,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: OPENAI_API_BASE.to_string(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            cost_per_million_tokens: 0.02,
            timeout_secs: 60,
        }
    }
}

/// Hosted database settings for the hybrid-search remote procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Project URL; RPCs are posted to `{url}/rest/v1/rpc/<name>`.
    pub url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    /// User whose documents are searched.
    pub user_id: String,
    /// Candidates requested from the RPC before re-ranking.
    pub match_count: usize,
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    /// Reciprocal rank fusion constant.
    pub rrf_k: u32,
    /// Similarity floor for the semantic-only fallback.
    pub min_similarity: f64,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            user_id: String::new(),
            match_count: 15,
            semantic_weight: 0.6,
            keyword_weight: 0.4,
            rrf_k: 60,
            min_similarity: 0.3,
            timeout_secs: 60,
        }
    }
}

/// Batch run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Number of results scored per question.
    pub top_k: usize,
    /// Pause between questions, in milliseconds.
    pub delay_ms: u64,
    /// Directory that receives timestamped reports.
    pub reports_dir: PathBuf,
    /// Append chapter/article cross-references to queries.
    pub expand_queries: bool,
    /// Re-rank search candidates with the chat model.
    pub enable_reranking: bool,
    /// Run the LLM judges for every question.
    pub use_llm_judges: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            delay_ms: 100,
            reports_dir: PathBuf::from("reports"),
            expand_queries: true,
            enable_reranking: false,
            use_llm_judges: true,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub eval: EvalConfig,
}

impl Config {
    /// Load configuration from the config file, `.env` and the environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (and `.env` entries not already set)
    /// 2. Config file (`path`, or ~/.config/rag-evaluator/config.yaml)
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        let _ = dotenvy::dotenv();
        config.apply_env(|key| env::var(key).ok());

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = key.clone();
            self.embedding.api_key = key;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(api_base) = lookup("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(tokens) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = tokens;
        }
        if let Some(temp) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = temp;
        }

        if let Some(api_base) = lookup("EMBEDDING_API_BASE") {
            self.embedding.api_base = api_base;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Some(url) = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.search.url = url;
        }
        if let Some(key) = first(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]) {
            self.search.api_key = key;
        }
        if let Some(user_id) = lookup("RAG_EVAL_USER_ID") {
            self.search.user_id = user_id;
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-evaluator")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Check the settings needed for chat completions.
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(EvalError::Config(
                "LLM API base URL is required. Set LLM_API_BASE or add llm.api_base to the config file.".to_string(),
            ));
        }
        if self.llm.api_key.is_empty() {
            return Err(EvalError::Config(
                "LLM API key is required. Set OPENAI_API_KEY or LLM_API_KEY.".to_string(),
            ));
        }
        if self.llm.model.is_empty() {
            return Err(EvalError::Config("LLM model is required.".to_string()));
        }
        Ok(())
    }

    /// Check the settings needed for the embeddings endpoint.
    pub fn validate_embedding(&self) -> Result<()> {
        if self.embedding.api_key.is_empty() {
            return Err(EvalError::Config(
                "Embedding API key is required. Set OPENAI_API_KEY.".to_string(),
            ));
        }
        Ok(())
    }

    /// Check the settings needed for the hybrid-search RPC.
    pub fn validate_search(&self) -> Result<()> {
        if self.search.url.is_empty() {
            return Err(EvalError::Config(
                "Search URL is required. Set SUPABASE_URL or add search.url to the config file."
                    .to_string(),
            ));
        }
        if self.search.api_key.is_empty() {
            return Err(EvalError::Config(
                "Search API key is required. Set SUPABASE_ANON_KEY.".to_string(),
            ));
        }
        if self.search.user_id.is_empty() {
            return Err(EvalError::Config(
                "Search user id is required. Set RAG_EVAL_USER_ID or add search.user_id."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.api_key.is_empty());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.search.match_count, 15);
        assert_eq!(config.search.rrf_k, 60);
        assert_eq!(config.eval.top_k, 5);
        assert_eq!(config.eval.delay_ms, 100);
        assert!(!config.eval.enable_reranking);
    }

    #[test]
    fn test_validate_fails_without_required_fields() {
        let config = Config::default();
        assert!(config.validate_llm().is_err());
        assert!(config.validate_embedding().is_err());
        assert!(config.validate_search().is_err());
    }

    #[test]
    fn test_openai_key_feeds_llm_and_embeddings() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[("OPENAI_API_KEY", "sk-test")]));

        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.embedding.api_key, "sk-test");
        assert!(config.validate_llm().is_ok());
        assert!(config.validate_embedding().is_ok());
    }

    #[test]
    fn test_llm_key_overrides_openai_key() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("OPENAI_API_KEY", "shared"),
            ("LLM_API_KEY", "judge-only"),
        ]));

        assert_eq!(config.llm.api_key, "judge-only");
        assert_eq!(config.embedding.api_key, "shared");
    }

    #[test]
    fn test_search_env_prefers_plain_names() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("SUPABASE_URL", "https://primary.example.com"),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://public.example.com"),
            ("NEXT_PUBLIC_SUPABASE_ANON_KEY", "anon"),
            ("RAG_EVAL_USER_ID", "user-1"),
        ]));

        assert_eq!(config.search.url, "https://primary.example.com");
        assert_eq!(config.search.api_key, "anon");
        assert_eq!(config.search.user_id, "user-1");
        assert!(config.validate_search().is_ok());
    }

    #[test]
    fn test_unparseable_numbers_are_ignored() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("LLM_MAX_TOKENS", "lots"),
            ("LLM_TEMPERATURE", "0.5"),
        ]));

        assert_eq!(config.llm.max_tokens, 800);
        assert_eq!(config.llm.temperature, 0.5);
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "search:\n  url: https://db.example.com\n  match_count: 20\neval:\n  top_k: 3\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.search.url, "https://db.example.com");
        assert_eq!(config.search.match_count, 20);
        assert_eq!(config.search.rrf_k, 60);
        assert_eq!(config.eval.top_k, 3);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "eval: [not, a, map]").unwrap();

        assert!(matches!(
            Config::load_from_file(&path),
            Err(EvalError::Config(_))
        ));
    }
}
