//! Evaluation module
//!
//! Scores runs (query ID -> ranked document IDs) against graded relevance
//! judgments with NDCG@k, MRR@k and Recall@k.

mod metrics;

pub use metrics::{dcg, mrr_at_k, ndcg_at_k, recall_at_k, QueryQrels, MAX_GRADE};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Ranked results of one retrieval system for every query it answered
pub type Run = BTreeMap<String, Vec<String>>;

/// Default NDCG cutoff
pub const DEFAULT_K_NDCG: usize = 10;
/// Default MRR cutoff
pub const DEFAULT_K_MRR: usize = 10;
/// Default Recall cutoff
pub const DEFAULT_K_RECALL: usize = 50;

/// Ground-truth relevance judgments for a query set
///
/// A (query, document) pair without a judgment has grade 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qrels {
    judgments: HashMap<String, QueryQrels>,
}

impl Qrels {
    /// Create an empty judgment set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grade, replacing any earlier grade for the same pair
    pub fn insert(&mut self, query_id: impl Into<String>, doc_id: impl Into<String>, grade: u32) {
        self.judgments
            .entry(query_id.into())
            .or_default()
            .insert(doc_id.into(), grade);
    }

    /// Judgments for one query
    pub fn get(&self, query_id: &str) -> Option<&QueryQrels> {
        self.judgments.get(query_id)
    }

    /// Whether the query has any judgments at all
    pub fn contains_query(&self, query_id: &str) -> bool {
        self.judgments.contains_key(query_id)
    }

    /// IDs of all judged queries
    pub fn query_ids(&self) -> impl Iterator<Item = &String> {
        self.judgments.keys()
    }

    /// Number of judged queries
    pub fn len(&self) -> usize {
        self.judgments.len()
    }

    /// Check if there are no judgments
    pub fn is_empty(&self) -> bool {
        self.judgments.is_empty()
    }

    /// Total number of (query, document) judgments
    pub fn num_judgments(&self) -> usize {
        self.judgments.values().map(HashMap::len).sum()
    }
}

impl From<HashMap<String, QueryQrels>> for Qrels {
    fn from(judgments: HashMap<String, QueryQrels>) -> Self {
        Self { judgments }
    }
}

/// Metric cutoffs used by [`evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cutoffs {
    pub ndcg: usize,
    pub mrr: usize,
    pub recall: usize,
}

impl Default for Cutoffs {
    fn default() -> Self {
        Self {
            ndcg: DEFAULT_K_NDCG,
            mrr: DEFAULT_K_MRR,
            recall: DEFAULT_K_RECALL,
        }
    }
}

impl Cutoffs {
    pub fn ndcg_key(&self) -> String {
        format!("ndcg@{}", self.ndcg)
    }

    pub fn mrr_key(&self) -> String {
        format!("mrr@{}", self.mrr)
    }

    pub fn recall_key(&self) -> String {
        format!("recall@{}", self.recall)
    }

    /// Recover the cutoffs a report was computed with from its metric keys
    ///
    /// `None` unless the report holds exactly one `ndcg@`, `mrr@` and
    /// `recall@` key each.
    pub fn from_report(report: &MetricReport) -> Option<Self> {
        let cutoff = |prefix: &str| -> Option<usize> {
            let mut found = report
                .metrics
                .keys()
                .filter_map(|key| key.strip_prefix(prefix))
                .map(|k| k.parse::<usize>().ok());
            let k = found.next()??;
            match found.next() {
                Some(_) => None,
                None => Some(k),
            }
        };
        Some(Self {
            ndcg: cutoff("ndcg@")?,
            mrr: cutoff("mrr@")?,
            recall: cutoff("recall@")?,
        })
    }
}

/// Metrics of a single query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryScores {
    pub query_id: String,
    pub ndcg: f64,
    pub mrr: f64,
    pub recall: f64,
}

/// Averaged metrics of one run
///
/// Serializes as a flat object, e.g.
/// `{"mrr@10": 0.5, "ndcg@10": 0.6, "recall@50": 0.8, "num_queries": 2}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
    pub num_queries: usize,
}

impl MetricReport {
    /// Average of a metric by name, e.g. `"ndcg@10"`
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// Judged queries that a run never answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coverage {
    /// Queries with judgments
    pub judged: usize,
    /// Judged queries present in the run
    pub covered: usize,
    /// Judged queries absent from the run, sorted
    pub missing: Vec<String>,
}

impl Coverage {
    /// Covered share of judged queries (1.0 when nothing is judged)
    pub fn ratio(&self) -> f64 {
        if self.judged == 0 {
            1.0
        } else {
            self.covered as f64 / self.judged as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Score one query at the given cutoffs
pub fn score_query(
    query_id: &str,
    ranked_ids: &[String],
    query_qrels: &QueryQrels,
    cutoffs: Cutoffs,
) -> QueryScores {
    QueryScores {
        query_id: query_id.to_string(),
        ndcg: ndcg_at_k(ranked_ids, query_qrels, cutoffs.ndcg),
        mrr: mrr_at_k(ranked_ids, query_qrels, cutoffs.mrr),
        recall: recall_at_k(ranked_ids, query_qrels, cutoffs.recall),
    }
}

/// Per-query scores for every query in the run, in run order
pub fn evaluate_per_query(run: &Run, qrels: &Qrels, cutoffs: Cutoffs) -> Vec<QueryScores> {
    let empty = QueryQrels::new();
    run.iter()
        .map(|(query_id, ranked_ids)| {
            let query_qrels = qrels.get(query_id).unwrap_or_else(|| {
                tracing::debug!(query_id = %query_id, "no judgments for query; scoring as zero");
                &empty
            });
            score_query(query_id, ranked_ids, query_qrels, cutoffs)
        })
        .collect()
}

/// Average NDCG, MRR and Recall over every query in `run`
///
/// Queries judged in `qrels` but missing from `run` are not part of the
/// average; see [`coverage`]. An empty run reports 0.0 for every metric.
pub fn evaluate(
    run: &Run,
    qrels: &Qrels,
    k_ndcg: usize,
    k_mrr: usize,
    k_recall: usize,
) -> MetricReport {
    let cutoffs = Cutoffs {
        ndcg: k_ndcg,
        mrr: k_mrr,
        recall: k_recall,
    };
    let scores = evaluate_per_query(run, qrels, cutoffs);

    let avg = |f: fn(&QueryScores) -> f64| {
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(f).sum::<f64>() / scores.len() as f64
        }
    };

    let mut metrics = BTreeMap::new();
    metrics.insert(cutoffs.ndcg_key(), avg(|s| s.ndcg));
    metrics.insert(cutoffs.mrr_key(), avg(|s| s.mrr));
    metrics.insert(cutoffs.recall_key(), avg(|s| s.recall));

    MetricReport {
        metrics,
        num_queries: scores.len(),
    }
}

/// [`evaluate`] with [`Cutoffs`]
pub fn evaluate_with(run: &Run, qrels: &Qrels, cutoffs: Cutoffs) -> MetricReport {
    evaluate(run, qrels, cutoffs.ndcg, cutoffs.mrr, cutoffs.recall)
}

/// Compare the run's query set against the judged query set
pub fn coverage(run: &Run, qrels: &Qrels) -> Coverage {
    let mut missing: Vec<String> = qrels
        .query_ids()
        .filter(|query_id| !run.contains_key(query_id.as_str()))
        .cloned()
        .collect();
    missing.sort();

    Coverage {
        judged: qrels.len(),
        covered: qrels.len() - missing.len(),
        missing,
    }
}
