//! Reranking module
//!
//! Cross-encoder reranking of the head of a fused list. The backend is chosen
//! once, when the pipeline is built:
//!
//! - `http`: a remote reranking service
//! - `local`: an embedded cross-encoder (requires the `local-models` feature)

mod http;
#[cfg(feature = "local-models")]
mod local;

pub use http::HttpReranker;
#[cfg(feature = "local-models")]
pub use local::LocalReranker;

use crate::config::AppConfig;
use crate::search::SearchResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use thiserror::Error;

/// Reranking errors
#[derive(Debug, Error)]
pub enum RerankError {
    /// Network error (connection failed, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the reranking service
    #[error("Rerank API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response parsing error
    #[error("Failed to parse rerank response: {0}")]
    Parse(String),

    /// Model initialization or inference failure
    #[error("Reranking model failed: {0}")]
    Model(String),

    /// Backend cannot be built from the configuration
    #[error("Invalid rerank configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for RerankError {
    fn from(err: reqwest::Error) -> Self {
        RerankError::Network(err.to_string())
    }
}

/// Reranking backend selector (`RERANK_MODE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RerankMode {
    /// Embedded cross-encoder model
    #[default]
    Local,
    /// Remote reranking service
    Http,
}

impl FromStr for RerankMode {
    type Err = RerankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(RerankMode::Local),
            "http" => Ok(RerankMode::Http),
            other => Err(RerankError::Config(format!(
                "unknown rerank mode '{}' (expected 'local' or 'http')",
                other
            ))),
        }
    }
}

/// Scores (id, text) candidates against a query
pub trait Reranker: Send + Sync {
    /// Return the candidates as results sorted by descending relevance score
    fn rerank(
        &self,
        query: &str,
        candidates: &[(String, String)],
    ) -> impl Future<Output = Result<Vec<SearchResult>, RerankError>> + Send;
}

/// Sort by descending score, keeping input order among equal scores
pub(crate) fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Reranker selected from configuration
pub enum RerankBackend {
    Http(HttpReranker),
    #[cfg(feature = "local-models")]
    Local(LocalReranker),
}

impl RerankBackend {
    /// Build the backend named by `config.rerank_mode()`
    pub fn from_config(config: &AppConfig) -> Result<Self, RerankError> {
        match config.rerank_mode() {
            RerankMode::Http => {
                let url = config.rerank_http_url().ok_or_else(|| {
                    RerankError::Config("RERANK_HTTP_URL not set but RERANK_MODE=http".to_string())
                })?;
                let reranker = HttpReranker::new(url, config.rerank_http_auth_header())?;
                tracing::info!("Using HTTP reranker at {}", url);
                Ok(RerankBackend::Http(reranker))
            }
            #[cfg(feature = "local-models")]
            RerankMode::Local => {
                let reranker = LocalReranker::new(config.reranker_model())?;
                Ok(RerankBackend::Local(reranker))
            }
            #[cfg(not(feature = "local-models"))]
            RerankMode::Local => Err(RerankError::Config(
                "RERANK_MODE=local requires building with `--features local-models`".to_string(),
            )),
        }
    }

    /// Human-readable backend name
    pub fn name(&self) -> &str {
        match self {
            RerankBackend::Http(_) => "http",
            #[cfg(feature = "local-models")]
            RerankBackend::Local(_) => "local",
        }
    }
}

impl Reranker for RerankBackend {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[(String, String)],
    ) -> Result<Vec<SearchResult>, RerankError> {
        match self {
            RerankBackend::Http(reranker) => reranker.rerank(query, candidates).await,
            #[cfg(feature = "local-models")]
            RerankBackend::Local(reranker) => reranker.rerank(query, candidates).await,
        }
    }
}
