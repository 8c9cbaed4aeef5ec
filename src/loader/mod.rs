//! Benchmark data loading module
//!
//! Loads documents, queries, relevance judgments and stored runs from flat
//! files.

mod atomic;
mod document;
mod jsonl;
mod qrels;
mod runs;

pub use atomic::write_atomic;
pub use document::{compose_text, Document, Query};
pub use jsonl::JsonlLoader;
pub use qrels::QrelsLoader;
pub use runs::RunSet;
