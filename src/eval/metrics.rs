//! Per-query ranking metrics
//!
//! Graded relevance follows the TREC convention: grade 0 (or no judgment) is
//! not relevant, higher grades are more relevant. All functions truncate the
//! ranked list to the cutoff `k` before scoring and return 0.0 rather than
//! dividing by zero.
//!
//! Gains grow as `2^grade`, so grades above [`MAX_GRADE`] are scored as
//! `MAX_GRADE` to keep every gain finite.

use std::collections::{HashMap, HashSet};

/// Relevance grades for one query, keyed by document ID
pub type QueryQrels = HashMap<String, u32>;

/// Largest grade that contributes its own gain
pub const MAX_GRADE: u32 = 100;

fn grade(query_qrels: &QueryQrels, doc_id: &str) -> u32 {
    query_qrels.get(doc_id).copied().unwrap_or(0)
}

/// Discounted cumulative gain with exponential gain
///
/// `sum over 1-based i of (2^rel_i - 1) / log2(i + 1)`
pub fn dcg(relevances: &[u32]) -> f64 {
    relevances
        .iter()
        .enumerate()
        .map(|(i, &rel)| (f64::from(rel.min(MAX_GRADE)).exp2() - 1.0) / ((i + 2) as f64).log2())
        .sum()
}

/// NDCG@k: achieved DCG over the DCG of the ideal ordering of all judgments
///
/// Returns exactly 0.0 when the ideal DCG is 0 (no relevant documents, or
/// `k == 0`).
pub fn ndcg_at_k(ranked_ids: &[String], query_qrels: &QueryQrels, k: usize) -> f64 {
    let mut ideal: Vec<u32> = query_qrels.values().copied().collect();
    ideal.sort_unstable_by(|a, b| b.cmp(a));
    ideal.truncate(k);

    let ideal_dcg = dcg(&ideal);
    if ideal_dcg == 0.0 {
        return 0.0;
    }

    let achieved: Vec<u32> = ranked_ids
        .iter()
        .take(k)
        .map(|doc_id| grade(query_qrels, doc_id))
        .collect();

    dcg(&achieved) / ideal_dcg
}

/// MRR@k: reciprocal 1-based position of the first relevant document
pub fn mrr_at_k(ranked_ids: &[String], query_qrels: &QueryQrels, k: usize) -> f64 {
    ranked_ids
        .iter()
        .take(k)
        .position(|doc_id| grade(query_qrels, doc_id) > 0)
        .map_or(0.0, |idx| 1.0 / (idx + 1) as f64)
}

/// Recall@k: share of relevant documents found in the first `k`
pub fn recall_at_k(ranked_ids: &[String], query_qrels: &QueryQrels, k: usize) -> f64 {
    let relevant: HashSet<&str> = query_qrels
        .iter()
        .filter(|(_, rel)| **rel > 0)
        .map(|(doc_id, _)| doc_id.as_str())
        .collect();

    if relevant.is_empty() {
        return 0.0;
    }

    let retrieved: HashSet<&str> = ranked_ids.iter().take(k).map(String::as_str).collect();
    let hits = relevant.intersection(&retrieved).count();

    hits as f64 / relevant.len() as f64
}
