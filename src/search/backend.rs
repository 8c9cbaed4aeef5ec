//! Search backend abstraction
//!
//! The pipeline only needs three capabilities from a search engine: lexical
//! retrieval, approximate vector retrieval and document text lookup.

use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

/// Search backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network error (connection failed, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the search engine
    #[error("Search engine error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response parsing error
    #[error("Failed to parse search response: {0}")]
    Parse(String),

    /// Client cannot be built from the configuration
    #[error("Invalid search backend configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Network(err.to_string())
    }
}

/// Retrieval capabilities used by the benchmark pipeline
pub trait SearchBackend: Send + Sync {
    /// BM25 retrieval; document IDs in descending score order
    fn lexical_search(
        &self,
        query: &str,
        topn: usize,
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;

    /// Approximate nearest-neighbour retrieval over document embeddings
    fn vector_search(
        &self,
        vector: &[f32],
        topn: usize,
        num_candidates: usize,
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;

    /// Text (`"{title}\n\n{body}"`) for each ID found; unknown IDs are absent
    fn fetch_texts(
        &self,
        doc_ids: &[String],
    ) -> impl Future<Output = Result<HashMap<String, String>, BackendError>> + Send;
}
