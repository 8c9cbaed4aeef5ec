//! Pipeline and resumable runner tests with in-memory backends

use rankeval::config::RetrievalConfig;
use rankeval::embedding::{Embedder, EmbeddingError};
use rankeval::eval::{evaluate_with, Cutoffs};
use rankeval::loader::{Query, QrelsLoader};
use rankeval::pipeline::{run_resumable, Checkpoint, Pipeline, SYSTEMS};
use rankeval::rerank::{RerankError, Reranker};
use rankeval::search::{BackendError, SearchBackend, SearchResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Lexical hits are documents whose text contains a query word; vector hits
/// are a fixed list
struct MemoryBackend {
    docs: Vec<(String, String)>,
    lexical_calls: Arc<AtomicUsize>,
}

impl MemoryBackend {
    fn new(calls: Arc<AtomicUsize>) -> Self {
        let docs = [
            ("d1", "rust ownership and borrowing"),
            ("d2", "vector search with dense embeddings"),
            ("d3", "hybrid search fuses rust and vectors"),
            ("d4", "unrelated cooking recipe"),
        ];
        Self {
            docs: docs
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
            lexical_calls: calls,
        }
    }
}

impl SearchBackend for MemoryBackend {
    async fn lexical_search(&self, query: &str, topn: usize) -> Result<Vec<String>, BackendError> {
        self.lexical_calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<&str> = query.split_whitespace().collect();
        Ok(self
            .docs
            .iter()
            .filter(|(_, text)| words.iter().any(|w| text.contains(w)))
            .map(|(id, _)| id.clone())
            .take(topn)
            .collect())
    }

    async fn vector_search(
        &self,
        _vector: &[f32],
        topn: usize,
        _num_candidates: usize,
    ) -> Result<Vec<String>, BackendError> {
        Ok(["d3", "d2", "d1"].iter().take(topn).map(|s| s.to_string()).collect())
    }

    async fn fetch_texts(&self, doc_ids: &[String]) -> Result<HashMap<String, String>, BackendError> {
        Ok(self
            .docs
            .iter()
            .filter(|(id, _)| doc_ids.contains(id))
            .cloned()
            .collect())
    }
}

struct ConstantEmbedder;

impl Embedder for ConstantEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![0.6, 0.8]).collect())
    }
}

/// Scores candidates by how many query words their text contains
struct OverlapReranker;

impl Reranker for OverlapReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[(String, String)],
    ) -> Result<Vec<SearchResult>, RerankError> {
        let mut results: Vec<SearchResult> = candidates
            .iter()
            .map(|(id, text)| {
                let overlap = query.split_whitespace().filter(|w| text.contains(w)).count();
                SearchResult::new(id.clone(), overlap as f64)
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }
}

/// Returns the top candidate twice, an ID it was never given, and drops the rest
struct SloppyReranker;

impl Reranker for SloppyReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: &[(String, String)],
    ) -> Result<Vec<SearchResult>, RerankError> {
        let Some((first, _)) = candidates.first() else {
            return Ok(Vec::new());
        };
        Ok(vec![
            SearchResult::new(first.clone(), 0.9),
            SearchResult::new(first.clone(), 0.8),
            SearchResult::new("zz", 0.7),
        ])
    }
}

fn queries() -> Vec<Query> {
    vec![
        Query::new("q1", "rust borrowing"),
        Query::new("q2", "vector search"),
        Query::new("q3", "hybrid rust vectors"),
    ]
}

fn pipeline(calls: Arc<AtomicUsize>) -> Pipeline<MemoryBackend, ConstantEmbedder, OverlapReranker> {
    Pipeline::new(
        MemoryBackend::new(calls),
        ConstantEmbedder,
        OverlapReranker,
        RetrievalConfig::default().with_topn(10).with_knn_candidates(10),
    )
    .unwrap()
}

#[tokio::test]
async fn test_run_query_outputs() {
    let outcome = pipeline(Arc::default())
        .run_query(&Query::new("q1", "rust borrowing"))
        .await
        .unwrap();

    assert_eq!(outcome.bm25, vec!["d1", "d3"]);
    assert_eq!(outcome.knn, vec!["d3", "d2", "d1"]);
    // d3: 1/62 + 1/61, d1: 1/61 + 1/63, d2: 1/62
    assert_eq!(outcome.fused, vec!["d3", "d1", "d2"]);
    // d1 matches both words, d3 only "rust"
    assert_eq!(outcome.reranked, vec!["d1", "d3", "d2"]);

    let row = &outcome.latency;
    let sum = row.bm25_ms + row.knn_ms + row.fusion_ms + row.rerank_ms;
    assert!((row.total_ms - sum).abs() < 1e-9);
    assert!(row.total_ms >= 0.0);
}

#[tokio::test]
async fn test_run_resumable_writes_checkpoint() {
    let report_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let progress = run_resumable(&pipeline(calls.clone()), &queries(), report_dir.path())
        .await
        .unwrap();
    assert_eq!(progress.total, 3);
    assert_eq!(progress.resumed, 0);
    assert_eq!(progress.processed, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let checkpoint = Checkpoint::load(report_dir.path()).unwrap();
    for query in queries() {
        assert!(checkpoint.is_complete(&query.query_id));
    }
    for system in SYSTEMS {
        assert_eq!(checkpoint.runs.get(system).unwrap().len(), 3);
    }
    assert_eq!(checkpoint.latency.len(), 3);
}

#[tokio::test]
async fn test_run_resumable_skips_completed_queries() {
    let report_dir = TempDir::new().unwrap();
    let first_calls = Arc::new(AtomicUsize::new(0));
    run_resumable(&pipeline(first_calls), &queries()[..2], report_dir.path())
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let progress = run_resumable(&pipeline(calls.clone()), &queries(), report_dir.path())
        .await
        .unwrap();

    assert_eq!(progress.resumed, 2);
    assert_eq!(progress.processed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let again = run_resumable(&pipeline(calls.clone()), &queries(), report_dir.path())
        .await
        .unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_partial_query_is_rerun() {
    let report_dir = TempDir::new().unwrap();
    run_resumable(&pipeline(Arc::default()), &queries(), report_dir.path())
        .await
        .unwrap();

    // Simulate a crash between writing runs.json and latency.csv
    let mut checkpoint = Checkpoint::load(report_dir.path()).unwrap();
    checkpoint.latency.retain(|row| row.query_id != "q2");
    checkpoint.save(report_dir.path()).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let progress = run_resumable(&pipeline(calls.clone()), &queries(), report_dir.path())
        .await
        .unwrap();
    assert_eq!(progress.processed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let checkpoint = Checkpoint::load(report_dir.path()).unwrap();
    assert_eq!(checkpoint.latency.len(), 3);
}

#[tokio::test]
async fn test_end_to_end_evaluation() {
    let report_dir = TempDir::new().unwrap();
    run_resumable(&pipeline(Arc::default()), &queries(), report_dir.path())
        .await
        .unwrap();

    let qrels =
        QrelsLoader::load_from_string("qid\tdid\trel\nq1\td1\t2\nq2\td2\t1\nq3\td3\t2\n").unwrap();
    let checkpoint = Checkpoint::load(report_dir.path()).unwrap();

    for system in SYSTEMS {
        let report = evaluate_with(checkpoint.runs.get(system).unwrap(), &qrels, Cutoffs::default());
        assert_eq!(report.num_queries, 3);
        assert!((report.get("recall@50").unwrap() - 1.0).abs() < 1e-12, "{}", system);
    }

    let rerank = evaluate_with(
        checkpoint.runs.get("hybrid_rrf_rerank").unwrap(),
        &qrels,
        Cutoffs::default(),
    );
    assert!((rerank.get("mrr@10").unwrap() - 1.0).abs() < 1e-12);
}

#[tokio::test]
async fn test_reranker_output_is_reconciled_with_candidates() {
    let report_dir = TempDir::new().unwrap();
    let sloppy = Pipeline::new(
        MemoryBackend::new(Arc::default()),
        ConstantEmbedder,
        SloppyReranker,
        RetrievalConfig::default().with_topn(10).with_knn_candidates(10),
    )
    .unwrap();

    let outcome = sloppy.run_query(&Query::new("q1", "rust borrowing")).await.unwrap();
    assert_eq!(outcome.fused, vec!["d3", "d1", "d2"]);
    assert_eq!(outcome.reranked, vec!["d3", "d1", "d2"]);

    let progress = run_resumable(&sloppy, &queries()[..1], report_dir.path())
        .await
        .unwrap();
    assert_eq!(progress.processed, 1);

    // The saved runs stay loadable, so resuming and evaluating keep working
    let checkpoint = Checkpoint::load(report_dir.path()).unwrap();
    assert!(checkpoint.runs.validate().is_ok());
    let resumed = run_resumable(&sloppy, &queries(), report_dir.path())
        .await
        .unwrap();
    assert_eq!(resumed.resumed, 1);
    assert_eq!(resumed.processed, 2);
}
