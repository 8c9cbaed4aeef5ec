//! Benchmark pipeline
//!
//! For each query: embed, retrieve with BM25 and kNN, fuse with RRF, rerank
//! the head of the fused list, and time every stage. Four systems come out
//! of every query: `bm25`, `knn`, `hybrid_rrf` and `hybrid_rrf_rerank`.

mod checkpoint;
pub mod latency;
mod runner;

pub use checkpoint::{Checkpoint, LATENCY_FILE, RUNS_FILE};
pub use latency::{LatencyRow, LatencySummary, StageSummary};
pub use runner::{run_resumable, RunProgress};

use crate::config::RetrievalConfig;
use crate::embedding::{Embedder, EmbeddingError};
use crate::error::ValidationError;
use crate::loader::Query;
use crate::rerank::{RerankError, Reranker};
use crate::search::{doc_ids, BackendError, ReciprocalRankFusion, SearchBackend, SearchResult};
use std::collections::HashSet;
use std::time::Instant;
use thiserror::Error;

/// Lexical retrieval only
pub const SYSTEM_BM25: &str = "bm25";
/// Vector retrieval only
pub const SYSTEM_KNN: &str = "knn";
/// RRF of lexical and vector retrieval
pub const SYSTEM_HYBRID_RRF: &str = "hybrid_rrf";
/// RRF followed by cross-encoder reranking
pub const SYSTEM_HYBRID_RRF_RERANK: &str = "hybrid_rrf_rerank";

/// Every system a pipeline run produces
pub const SYSTEMS: [&str; 4] = [
    SYSTEM_BM25,
    SYSTEM_KNN,
    SYSTEM_HYBRID_RRF,
    SYSTEM_HYBRID_RRF_RERANK,
];

/// Failure of one pipeline stage
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("search failed: {0}")]
    Backend(#[from] BackendError),

    #[error("fusion failed: {0}")]
    Fusion(#[from] ValidationError),

    #[error("reranking failed: {0}")]
    Rerank(#[from] RerankError),
}

/// Ranked lists and timings of one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub query_id: String,
    pub bm25: Vec<String>,
    pub knn: Vec<String>,
    pub fused: Vec<String>,
    pub reranked: Vec<String>,
    pub latency: LatencyRow,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Order `head` by the reranker's output
///
/// Reranked IDs that were not sent, or that repeat, are dropped. Head IDs
/// the reranker left out follow in fused order. The result is always a
/// permutation of `head`.
fn align_reranked(query_id: &str, head: &[String], reranked: &[SearchResult]) -> Vec<String> {
    let sent: HashSet<&str> = head.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(head.len());
    let mut ordered = Vec::with_capacity(head.len());

    for result in reranked {
        let id = result.doc_id.as_str();
        if sent.contains(id) && seen.insert(id) {
            ordered.push(result.doc_id.clone());
        }
    }
    let dropped = reranked.len() - ordered.len();

    let missing: Vec<&String> = head.iter().filter(|id| !seen.contains(id.as_str())).collect();
    if dropped > 0 || !missing.is_empty() {
        tracing::warn!(
            query_id = %query_id,
            "reranker output did not match candidates: {} unexpected or repeated, {} missing",
            dropped,
            missing.len()
        );
    }
    ordered.extend(missing.into_iter().cloned());
    ordered
}

/// Retrieval, fusion and reranking for one query at a time
pub struct Pipeline<B, E, R> {
    backend: B,
    embedder: E,
    reranker: R,
    config: RetrievalConfig,
    rrf: ReciprocalRankFusion,
}

impl<B, E, R> Pipeline<B, E, R>
where
    B: SearchBackend,
    E: Embedder,
    R: Reranker,
{
    /// Assemble a pipeline; fails if `config.rrf_k` is 0
    pub fn new(backend: B, embedder: E, reranker: R, config: RetrievalConfig) -> Result<Self, ValidationError> {
        let rrf = ReciprocalRankFusion::with_k(config.rrf_k)?;
        Ok(Self {
            backend,
            embedder,
            reranker,
            config,
            rrf,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Run every stage for `query`
    ///
    /// The reranked list holds the reranked head of the fused list followed
    /// by the fused IDs beyond `rerank_topn`, and has exactly the fused IDs.
    pub async fn run_query(&self, query: &Query) -> Result<QueryOutcome, PipelineError> {
        let cfg = &self.config;
        let vector = self.embedder.embed(&query.query).await?;

        let start = Instant::now();
        let bm25 = self.backend.lexical_search(&query.query, cfg.topn).await?;
        let bm25_ms = elapsed_ms(start);

        let start = Instant::now();
        let knn = self
            .backend
            .vector_search(&vector, cfg.topn, cfg.knn_candidates)
            .await?;
        let knn_ms = elapsed_ms(start);

        let start = Instant::now();
        let fused = doc_ids(&self.rrf.fuse(&[&bm25, &knn], cfg.rerank_topn)?);
        let fusion_ms = elapsed_ms(start);

        let start = Instant::now();
        let head_len = cfg.rerank_topn.min(fused.len());
        let (head, tail) = fused.split_at(head_len);
        let mut texts = self.backend.fetch_texts(head).await?;
        let candidates: Vec<(String, String)> = head
            .iter()
            .map(|id| (id.clone(), texts.remove(id).unwrap_or_default()))
            .collect();
        let reranked_head = self.reranker.rerank(&query.query, &candidates).await?;
        let rerank_ms = elapsed_ms(start);

        let mut reranked = align_reranked(&query.query_id, head, &reranked_head);
        reranked.extend(tail.iter().cloned());

        tracing::debug!(
            query_id = %query.query_id,
            bm25 = bm25.len(),
            knn = knn.len(),
            fused = fused.len(),
            "query done in {:.1} ms",
            bm25_ms + knn_ms + fusion_ms + rerank_ms
        );

        Ok(QueryOutcome {
            query_id: query.query_id.clone(),
            latency: LatencyRow::new(&query.query_id, bm25_ms, knn_ms, fusion_ms, rerank_ms),
            bm25,
            knn,
            fused,
            reranked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchResult;
    use std::collections::HashMap;

    struct FixedBackend;

    impl SearchBackend for FixedBackend {
        async fn lexical_search(&self, _query: &str, topn: usize) -> Result<Vec<String>, BackendError> {
            Ok(["a", "b", "c"].iter().take(topn).map(|s| s.to_string()).collect())
        }

        async fn vector_search(
            &self,
            _vector: &[f32],
            topn: usize,
            _num_candidates: usize,
        ) -> Result<Vec<String>, BackendError> {
            Ok(["c", "d"].iter().take(topn).map(|s| s.to_string()).collect())
        }

        async fn fetch_texts(&self, doc_ids: &[String]) -> Result<HashMap<String, String>, BackendError> {
            Ok(doc_ids
                .iter()
                .filter(|id| id.as_str() != "d")
                .map(|id| (id.clone(), format!("text of {}", id)))
                .collect())
        }
    }

    struct UnitEmbedder;

    impl Embedder for UnitEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Scores shorter texts higher, so "d" (no text) wins
    struct ShortestFirst;

    impl Reranker for ShortestFirst {
        async fn rerank(
            &self,
            _query: &str,
            candidates: &[(String, String)],
        ) -> Result<Vec<SearchResult>, RerankError> {
            let mut results: Vec<SearchResult> = candidates
                .iter()
                .map(|(id, text)| SearchResult::new(id.clone(), -(text.len() as f64)))
                .collect();
            crate::rerank::sort_by_score(&mut results);
            Ok(results)
        }
    }

    fn pipeline(config: RetrievalConfig) -> Pipeline<FixedBackend, UnitEmbedder, ShortestFirst> {
        Pipeline::new(FixedBackend, UnitEmbedder, ShortestFirst, config).unwrap()
    }

    #[tokio::test]
    async fn test_run_query_produces_all_systems() {
        let outcome = pipeline(RetrievalConfig::default())
            .run_query(&Query::new("q1", "anything"))
            .await
            .unwrap();

        assert_eq!(outcome.bm25, vec!["a", "b", "c"]);
        assert_eq!(outcome.knn, vec!["c", "d"]);
        // c: 1/63 + 1/61, a: 1/61, d: 1/62, b: 1/62
        assert_eq!(outcome.fused, vec!["c", "a", "b", "d"]);
        assert_eq!(outcome.reranked[0], "d");
        assert_eq!(outcome.reranked.len(), 4);
        assert_eq!(outcome.latency.query_id, "q1");
    }

    #[tokio::test]
    async fn test_rerank_only_touches_head() {
        let config = RetrievalConfig::default().with_rerank_topn(2);
        let outcome = pipeline(config).run_query(&Query::new("q1", "x")).await.unwrap();

        assert_eq!(outcome.fused, vec!["c", "a"]);
        assert_eq!(outcome.reranked.len(), 2);
    }

    fn results(ids: &[&str]) -> Vec<SearchResult> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| SearchResult::new(id.to_string(), 1.0 / (i + 1) as f64))
            .collect()
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_align_reranked_keeps_valid_order() {
        let head = strings(&["a", "b", "c"]);
        let aligned = align_reranked("q1", &head, &results(&["c", "a", "b"]));
        assert_eq!(aligned, strings(&["c", "a", "b"]));
    }

    #[test]
    fn test_align_reranked_drops_repeats_and_unknown_ids() {
        let head = strings(&["d2", "d1", "d3"]);
        let aligned = align_reranked("q1", &head, &results(&["d2", "d2", "zz"]));
        assert_eq!(aligned, strings(&["d2", "d1", "d3"]));
    }

    #[test]
    fn test_align_reranked_empty_output_keeps_fused_order() {
        let head = strings(&["a", "b"]);
        assert_eq!(align_reranked("q1", &head, &[]), head);
    }

    #[test]
    fn test_new_rejects_zero_k() {
        let config = RetrievalConfig::default().with_rrf_k(0);
        assert!(Pipeline::new(FixedBackend, UnitEmbedder, ShortestFirst, config).is_err());
    }
}
