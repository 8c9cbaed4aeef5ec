//! Resumable run state
//!
//! A benchmark run persists after every query so an interrupted run picks up
//! where it stopped. A query counts as done only when every system has its
//! ranked list and a latency row exists.

use super::latency::{self, LatencyRow};
use super::{QueryOutcome, SYSTEMS, SYSTEM_BM25, SYSTEM_HYBRID_RRF, SYSTEM_HYBRID_RRF_RERANK, SYSTEM_KNN};
use crate::loader::{Query, RunSet};
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Stored runs file name
pub const RUNS_FILE: &str = "runs.json";
/// Stored latency file name
pub const LATENCY_FILE: &str = "latency.csv";

/// Runs and latencies collected so far
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub runs: RunSet,
    pub latency: Vec<LatencyRow>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Checkpoint {
    /// Empty checkpoint with a run for each pipeline system
    pub fn new() -> Self {
        Self {
            runs: RunSet::with_systems(&SYSTEMS),
            latency: Vec::new(),
        }
    }

    pub fn runs_path(report_dir: &Path) -> PathBuf {
        report_dir.join(RUNS_FILE)
    }

    pub fn latency_path(report_dir: &Path) -> PathBuf {
        report_dir.join(LATENCY_FILE)
    }

    /// Load whatever a previous run left in `report_dir`
    pub fn load(report_dir: &Path) -> Result<Self> {
        let mut checkpoint = Self::new();

        let runs_path = Self::runs_path(report_dir);
        if runs_path.exists() {
            checkpoint.runs = RunSet::load_from_file(&runs_path)?;
            for system in SYSTEMS {
                checkpoint.runs.ensure_system(system);
            }
        }

        let latency_path = Self::latency_path(report_dir);
        if latency_path.exists() {
            checkpoint.latency = latency::load_csv(&latency_path)?;
        }

        Ok(checkpoint)
    }

    /// Persist both files, each replaced atomically
    pub fn save(&self, report_dir: &Path) -> Result<()> {
        self.runs.save_to_file(&Self::runs_path(report_dir))?;
        latency::save_csv(&Self::latency_path(report_dir), &self.latency)
    }

    fn timed_queries(&self) -> HashSet<&str> {
        self.latency.iter().map(|r| r.query_id.as_str()).collect()
    }

    /// Whether `query_id` has results for every system and a latency row
    pub fn is_complete(&self, query_id: &str) -> bool {
        self.runs.has_query_in_all(&SYSTEMS, query_id)
            && self.latency.iter().any(|r| r.query_id == query_id)
    }

    /// Queries still to run, in input order
    pub fn pending<'a>(&self, queries: &'a [Query]) -> Vec<&'a Query> {
        let timed = self.timed_queries();
        queries
            .iter()
            .filter(|q| {
                !(timed.contains(q.query_id.as_str())
                    && self.runs.has_query_in_all(&SYSTEMS, &q.query_id))
            })
            .collect()
    }

    /// Record one query, replacing any partial state it left before
    pub fn record(&mut self, outcome: QueryOutcome) {
        let QueryOutcome {
            query_id,
            bm25,
            knn,
            fused,
            reranked,
            latency,
        } = outcome;

        self.runs.insert(SYSTEM_BM25, query_id.clone(), bm25);
        self.runs.insert(SYSTEM_KNN, query_id.clone(), knn);
        self.runs.insert(SYSTEM_HYBRID_RRF, query_id.clone(), fused);
        self.runs.insert(SYSTEM_HYBRID_RRF_RERANK, query_id.clone(), reranked);

        self.latency.retain(|r| r.query_id != query_id);
        self.latency.push(latency);
    }
}
