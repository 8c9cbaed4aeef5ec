//! Reciprocal Rank Fusion implementation
//!
//! Combines any number of ranked lists for the same query using RRF.
//! Documents with equal fused scores keep the order in which they were first
//! seen (lists scanned in order, each from rank 1 down).

use super::SearchResult;
use crate::error::ValidationError;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// RRF constant (typically 60)
pub const DEFAULT_RRF_K: u32 = 60;

/// Reciprocal Rank Fusion for combining ranked lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReciprocalRankFusion {
    /// RRF constant k
    k: u32,
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        Self::new()
    }
}

impl ReciprocalRankFusion {
    /// Create a new RRF instance with default k=60
    pub fn new() -> Self {
        Self { k: DEFAULT_RRF_K }
    }

    /// Create a new RRF instance with custom k
    pub fn with_k(k: u32) -> Result<Self, ValidationError> {
        if k == 0 {
            return Err(ValidationError::InvalidDampingConstant);
        }
        Ok(Self { k })
    }

    /// Damping constant in use
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Fuse ranked lists into a single list of at most `max_out` results
    ///
    /// RRF score = sum(1 / (k + rank_i)) over every list the document is in,
    /// with 1-based ranks. Empty input (or only empty lists) yields an empty
    /// result.
    pub fn fuse<L: AsRef<[String]>>(
        &self,
        ranked_lists: &[L],
        max_out: usize,
    ) -> Result<Vec<SearchResult>, ValidationError> {
        if max_out == 0 {
            return Err(ValidationError::InvalidOutputCap);
        }

        let k = f64::from(self.k);
        let mut first_seen: Vec<&str> = Vec::new();
        let mut scores: HashMap<&str, f64> = HashMap::new();

        for (list_idx, list) in ranked_lists.iter().enumerate() {
            let mut in_list = HashSet::new();
            for (rank, doc_id) in list.as_ref().iter().enumerate() {
                if !in_list.insert(doc_id.as_str()) {
                    return Err(ValidationError::DuplicateDocument {
                        list: list_idx,
                        doc_id: doc_id.clone(),
                    });
                }

                let rrf_score = 1.0 / (k + (rank + 1) as f64);
                match scores.entry(doc_id.as_str()) {
                    Entry::Occupied(mut entry) => *entry.get_mut() += rrf_score,
                    Entry::Vacant(entry) => {
                        first_seen.push(doc_id.as_str());
                        entry.insert(rrf_score);
                    }
                }
            }
        }

        let mut results: Vec<SearchResult> = first_seen
            .into_iter()
            .map(|doc_id| SearchResult::new(doc_id, scores[doc_id]))
            .collect();

        // Stable: ties stay in first-seen order
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(max_out);

        tracing::trace!(
            lists = ranked_lists.len(),
            fused = results.len(),
            "rrf fusion complete"
        );

        Ok(results)
    }
}

/// Fuse ranked lists with damping constant `k`, keeping at most `max_out`
pub fn rrf_fuse<L: AsRef<[String]>>(
    ranked_lists: &[L],
    k: u32,
    max_out: usize,
) -> Result<Vec<SearchResult>, ValidationError> {
    ReciprocalRankFusion::with_k(k)?.fuse(ranked_lists, max_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.doc_id.as_str()).collect()
    }

    #[test]
    fn test_rrf_creation() {
        let rrf = ReciprocalRankFusion::new();
        assert_eq!(rrf.k(), 60);
    }

    #[test]
    fn test_rrf_custom_k() {
        let rrf = ReciprocalRankFusion::with_k(30).unwrap();
        assert_eq!(rrf.k(), 30);
    }

    #[test]
    fn test_rrf_zero_k_rejected() {
        assert_eq!(
            ReciprocalRankFusion::with_k(0),
            Err(ValidationError::InvalidDampingConstant)
        );
    }

    #[test]
    fn test_rrf_zero_max_out_rejected() {
        let rrf = ReciprocalRankFusion::new();
        let result = rrf.fuse(&[list(&["a"])], 0);
        assert_eq!(result, Err(ValidationError::InvalidOutputCap));
    }

    #[test]
    fn test_rrf_duplicate_in_list_rejected() {
        let rrf = ReciprocalRankFusion::new();
        let result = rrf.fuse(&[list(&["a", "b"]), list(&["c", "a", "c"])], 10);
        assert_eq!(
            result,
            Err(ValidationError::DuplicateDocument {
                list: 1,
                doc_id: "c".to_string()
            })
        );
    }

    #[test]
    fn test_rrf_fusion_basic() {
        let rrf = ReciprocalRankFusion::new();
        let bm25 = list(&["doc1", "doc2", "doc3"]);
        let vector = list(&["doc2", "doc1", "doc4"]);

        let fused = rrf.fuse(&[bm25, vector], 10).unwrap();
        assert_eq!(fused.len(), 4);

        let score = |id: &str| fused.iter().find(|r| r.doc_id == id).unwrap().score;
        assert!(score("doc1") > score("doc3"));
        assert!(score("doc2") > score("doc4"));
    }

    #[test]
    fn test_rrf_fusion_empty() {
        let rrf = ReciprocalRankFusion::new();
        let no_lists: Vec<Vec<String>> = Vec::new();
        assert!(rrf.fuse(&no_lists, 10).unwrap().is_empty());
        assert!(rrf.fuse(&[list(&[]), list(&[])], 10).unwrap().is_empty());
    }

    #[test]
    fn test_rrf_score_calculation() {
        let fused = rrf_fuse(&[list(&["doc1"])], 60, 10).unwrap();
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_rrf_two_lists_ranks_consensus_first() {
        let fused = rrf_fuse(&[list(&["A", "B", "C"]), list(&["B", "C", "A"])], 60, 10).unwrap();
        // B: 1/62 + 1/61, A: 1/61 + 1/63, C: 1/63 + 1/62
        assert_eq!(ids(&fused), vec!["B", "A", "C"]);
        assert!((fused[0].score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-12);
        assert!((fused[1].score - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        assert!((fused[2].score - (1.0 / 62.0 + 1.0 / 63.0)).abs() < 1e-12);
    }

    #[test]
    fn test_rrf_tie_keeps_first_seen_order() {
        let fused = rrf_fuse(&[list(&["A", "B"]), list(&["B", "A"])], 60, 10).unwrap();
        assert_eq!(ids(&fused), vec!["A", "B"]);
        assert_eq!(fused[0].score, fused[1].score);
    }

    #[test]
    fn test_rrf_truncates_to_max_out() {
        let fused = rrf_fuse(&[list(&["a", "b", "c", "d"])], 60, 2).unwrap();
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn test_rrf_accepts_borrowed_slices() {
        let bm25 = list(&["x", "y"]);
        let knn = list(&["y", "z"]);
        let fused = rrf_fuse(&[&bm25[..], &knn[..]], 60, 10).unwrap();
        assert_eq!(ids(&fused)[0], "y");
    }
}
