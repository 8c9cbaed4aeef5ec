//! Retrieval configuration
//!
//! Candidate list sizes and fusion parameters shared by every query of a
//! benchmark run.

use crate::search::DEFAULT_RRF_K;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Retrieval configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results requested from lexical and vector search
    pub topn: usize,
    /// Candidate pool size for approximate kNN search
    pub knn_candidates: usize,
    /// RRF damping constant
    pub rrf_k: u32,
    /// Fused results passed to the reranker (also the fusion output cap)
    pub rerank_topn: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            topn: 50,
            knn_candidates: 100,
            rrf_k: DEFAULT_RRF_K,
            rerank_topn: 50,
        }
    }
}

impl RetrievalConfig {
    /// Create a new retrieval configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of results per retriever
    pub fn with_topn(mut self, topn: usize) -> Self {
        self.topn = topn;
        self
    }

    /// Set the kNN candidate pool size
    pub fn with_knn_candidates(mut self, candidates: usize) -> Self {
        self.knn_candidates = candidates;
        self
    }

    /// Set the RRF constant
    pub fn with_rrf_k(mut self, k: u32) -> Self {
        self.rrf_k = k;
        self
    }

    /// Set the rerank depth
    pub fn with_rerank_topn(mut self, topn: usize) -> Self {
        self.rerank_topn = topn;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.topn == 0 {
            return Err(anyhow!("topn must be greater than 0"));
        }
        if self.knn_candidates < self.topn {
            return Err(anyhow!(
                "knn_candidates ({}) must be at least topn ({})",
                self.knn_candidates,
                self.topn
            ));
        }
        if self.rrf_k == 0 {
            return Err(anyhow!("rrf_k must be greater than 0"));
        }
        if self.rerank_topn == 0 {
            return Err(anyhow!("rerank_topn must be greater than 0"));
        }
        Ok(())
    }
}
