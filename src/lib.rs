//! rankeval: hybrid retrieval benchmark
//!
//! This library runs a query set through lexical (BM25) and vector (kNN)
//! retrieval, fuses the two ranked lists with Reciprocal Rank Fusion (RRF),
//! reranks the fused head with a cross-encoder, and scores every system
//! against graded relevance judgments.
//!
//! # Features
//!
//! - Reciprocal Rank Fusion over any number of ranked lists
//! - NDCG@k, MRR@k and Recall@k with run-level averages
//! - Elasticsearch backend for BM25 and approximate kNN
//! - HTTP or embedded (`local-models` feature) embedding and reranking
//! - Resumable per-query benchmark runs with stage latencies
//!
//! # Modules
//!
//! - `config`: Application and retrieval configuration
//! - `loader`: Documents, queries, qrels and stored runs
//! - `search`: Search results, RRF fusion and search backends
//! - `embedding`: Text embedding backends
//! - `rerank`: Cross-encoder reranking backends
//! - `pipeline`: Per-query benchmark pipeline and resumable runner
//! - `eval`: Ranking metrics and run evaluation
//! - `report`: Markdown and JSON reports

pub mod config;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod rerank;
pub mod search;

// Re-export commonly used types
pub use config::{AppConfig, RetrievalConfig};
pub use error::ValidationError;
pub use eval::{evaluate, MetricReport, Qrels, Run};
pub use loader::{Document, Query};
pub use search::{rrf_fuse, ReciprocalRankFusion, SearchResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
