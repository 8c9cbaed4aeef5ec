//! Search module
//!
//! Result types, Reciprocal Rank Fusion and the search backend used by the
//! benchmark pipeline.

mod backend;
pub mod elasticsearch;
mod fusion;

pub use backend::{BackendError, SearchBackend};
pub use elasticsearch::ElasticsearchBackend;
pub use fusion::{rrf_fuse, ReciprocalRankFusion, DEFAULT_RRF_K};

use serde::{Deserialize, Serialize};

/// A scored document in a ranked list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document ID
    pub doc_id: String,
    /// Relevance score (fusion or reranker score, higher is better)
    pub score: f64,
}

impl SearchResult {
    /// Create a new search result
    pub fn new(doc_id: impl Into<String>, score: f64) -> Self {
        Self {
            doc_id: doc_id.into(),
            score,
        }
    }
}

/// Drop scores, keeping only the ranked document IDs
pub fn doc_ids(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| r.doc_id.clone()).collect()
}
