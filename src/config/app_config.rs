//! Application configuration module for rankeval
//!
//! Provides TOML-based configuration with environment variable override support.
//! Priority: CLI args > Environment variables > Config file > Defaults

use super::RetrievalConfig;
use crate::rerank::RerankMode;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding documents.jsonl, queries.jsonl and qrels.tsv
    data_dir: String,

    /// Base directory for per-dataset report directories
    reports_dir: String,

    /// Search engine URL
    es_url: String,

    /// Search engine API key
    #[serde(skip_serializing_if = "Option::is_none")]
    es_api_key: Option<String>,

    /// Index holding the benchmark corpus
    index_name: String,

    /// Embedding vector size
    embed_dims: usize,

    /// Embedding model name
    embedding_model: String,

    /// OpenAI-compatible embeddings endpoint (unset: embedded model)
    #[serde(skip_serializing_if = "Option::is_none")]
    embed_http_url: Option<String>,

    /// Bearer token for the embeddings endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    embed_api_key: Option<String>,

    /// Cross-encoder model name for local reranking
    reranker_model: String,

    /// Reranking backend
    rerank_mode: RerankMode,

    /// Reranking service URL (http mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    rerank_http_url: Option<String>,

    /// Extra header for the reranking service, e.g. `Authorization: Bearer XXX`
    #[serde(skip_serializing_if = "Option::is_none")]
    rerank_http_auth_header: Option<String>,

    /// Candidate sizes and fusion parameters
    retrieval: RetrievalConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: "dataset/data_lite".to_string(),
            reports_dir: "reports".to_string(),
            es_url: "http://localhost:9200".to_string(),
            es_api_key: None,
            index_name: "rankeval-hybrid".to_string(),
            embed_dims: 384,
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            embed_http_url: None,
            embed_api_key: None,
            reranker_model: "BAAI/bge-reranker-base".to_string(),
            rerank_mode: RerankMode::default(),
            rerank_http_url: None,
            rerank_http_auth_header: None,
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Read a non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an environment variable; a set but malformed value is an error
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid value for {}: {:?}", key, raw)),
    }
}

impl AppConfig {
    /// Create config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: AppConfig =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }

    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// Load the config file (if any) and apply environment overrides
    ///
    /// An explicit `path` must exist; without one the default config path is
    /// used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = super::path_resolver::get_default_config_path();
                if default_path.exists() {
                    tracing::debug!("Loading config from {}", default_path.display());
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        base.apply_env()
    }

    /// Override fields from environment variables that are set
    ///
    /// Numeric and enum variables that do not parse are rejected with the
    /// variable's name rather than silently falling back.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(v) = env_string("DATA_DIR") {
            self.data_dir = v;
        }
        if let Some(v) = env_string("REPORTS_DIR") {
            self.reports_dir = v;
        }
        if let Some(v) = env_string("ES_URL") {
            self.es_url = v;
        }
        if let Some(v) = env_string("ES_API_KEY") {
            self.es_api_key = Some(v);
        }
        if let Some(v) = env_string("INDEX_NAME") {
            self.index_name = v;
        }
        if let Some(v) = env_parse("EMBED_DIMS")? {
            self.embed_dims = v;
        }
        if let Some(v) = env_string("EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        if let Some(v) = env_string("EMBED_HTTP_URL") {
            self.embed_http_url = Some(v);
        }
        if let Some(v) = env_string("EMBED_API_KEY") {
            self.embed_api_key = Some(v);
        }
        if let Some(v) = env_string("RERANKER_MODEL") {
            self.reranker_model = v;
        }
        if let Some(v) = env_parse("RERANK_MODE")? {
            self.rerank_mode = v;
        }
        if let Some(v) = env_string("RERANK_HTTP_URL") {
            self.rerank_http_url = Some(v);
        }
        if let Some(v) = env_string("RERANK_HTTP_AUTH_HEADER") {
            self.rerank_http_auth_header = Some(v);
        }
        if let Some(v) = env_parse("RETRIEVAL_TOPN")? {
            self.retrieval.topn = v;
        }
        if let Some(v) = env_parse("KNN_NUM_CANDIDATES")? {
            self.retrieval.knn_candidates = v;
        }
        if let Some(v) = env_parse("RRF_K")? {
            self.retrieval.rrf_k = v;
        }
        if let Some(v) = env_parse("RERANK_TOPN")? {
            self.retrieval.rerank_topn = v;
        }
        Ok(self)
    }

    /// Override data_dir
    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.data_dir = dir.to_string();
        self
    }

    /// Override reports_dir
    pub fn with_reports_dir(mut self, dir: &str) -> Self {
        self.reports_dir = dir.to_string();
        self
    }

    /// Override es_url
    pub fn with_es_url(mut self, url: &str) -> Self {
        self.es_url = url.to_string();
        self
    }

    /// Override index_name
    pub fn with_index_name(mut self, name: &str) -> Self {
        self.index_name = name.to_string();
        self
    }

    /// Override retrieval parameters
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Override embed_http_url
    pub fn with_embed_http_url(mut self, url: &str) -> Self {
        self.embed_http_url = Some(url.to_string());
        self
    }

    /// Override rerank_mode
    pub fn with_rerank_mode(mut self, mode: RerankMode) -> Self {
        self.rerank_mode = mode;
        self
    }

    /// Override rerank_http_url
    pub fn with_rerank_http_url(mut self, url: &str) -> Self {
        self.rerank_http_url = Some(url.to_string());
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.embed_dims == 0 {
            return Err(anyhow!("embed_dims must be greater than 0"));
        }
        if self.index_name.trim().is_empty() {
            return Err(anyhow!("index_name must not be empty"));
        }
        if self.rerank_mode == RerankMode::Http && self.rerank_http_url.is_none() {
            return Err(anyhow!("RERANK_HTTP_URL not set but RERANK_MODE=http"));
        }
        self.retrieval.validate()
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| anyhow!("Failed to serialize config: {}", e))
    }

    // Getters
    pub fn data_dir(&self) -> &str {
        &self.data_dir
    }

    pub fn reports_dir(&self) -> &str {
        &self.reports_dir
    }

    pub fn es_url(&self) -> &str {
        &self.es_url
    }

    pub fn es_api_key(&self) -> Option<&str> {
        self.es_api_key.as_deref()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn embed_dims(&self) -> usize {
        self.embed_dims
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn embed_http_url(&self) -> Option<&str> {
        self.embed_http_url.as_deref()
    }

    pub fn embed_api_key(&self) -> Option<&str> {
        self.embed_api_key.as_deref()
    }

    pub fn reranker_model(&self) -> &str {
        &self.reranker_model
    }

    pub fn rerank_mode(&self) -> RerankMode {
        self.rerank_mode
    }

    pub fn rerank_http_url(&self) -> Option<&str> {
        self.rerank_http_url.as_deref()
    }

    pub fn rerank_http_auth_header(&self) -> Option<&str> {
        self.rerank_http_auth_header.as_deref()
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.es_url(), "http://localhost:9200");
        assert_eq!(config.embed_dims(), 384);
        assert_eq!(config.rerank_mode(), RerankMode::Local);
        assert_eq!(config.retrieval().rrf_k, 60);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_http_mode_requires_url() {
        let config = AppConfig::default().with_rerank_mode(RerankMode::Http);
        assert!(config.validate().is_err());

        let config = config.with_rerank_http_url("http://localhost:8080/rerank");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_retrieval() {
        let config = AppConfig::default().with_retrieval(RetrievalConfig::new().with_rrf_k(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default().with_index_name("bench").with_rerank_mode(RerankMode::Http);
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("rerank_mode = \"http\""));
        assert!(toml_str.contains("[retrieval]"));

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
