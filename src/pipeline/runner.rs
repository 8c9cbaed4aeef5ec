//! Resumable query loop

use super::{Checkpoint, Pipeline};
use crate::embedding::Embedder;
use crate::loader::Query;
use crate::rerank::Reranker;
use crate::search::SearchBackend;
use anyhow::{Context, Result};
use std::path::Path;

/// Outcome of a (possibly resumed) run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    /// Queries in the input
    pub total: usize,
    /// Queries already complete before this invocation
    pub resumed: usize,
    /// Queries processed by this invocation
    pub processed: usize,
}

/// Run every query not yet in `report_dir`, saving after each one
///
/// Completed queries are skipped, so an interrupted run resumes where it
/// stopped. Progress is logged at every 10% step and on completion.
pub async fn run_resumable<B, E, R>(
    pipeline: &Pipeline<B, E, R>,
    queries: &[Query],
    report_dir: &Path,
) -> Result<RunProgress>
where
    B: SearchBackend,
    E: Embedder,
    R: Reranker,
{
    let total = queries.len();
    let mut checkpoint = Checkpoint::load(report_dir)
        .with_context(|| format!("Failed to load previous run from {:?}", report_dir))?;

    let pending = checkpoint.pending(queries);
    let resumed = total - pending.len();

    if pending.is_empty() {
        tracing::info!("All {} queries already completed", total);
        return Ok(RunProgress {
            total,
            resumed,
            processed: 0,
        });
    }
    if resumed > 0 {
        tracing::info!("Resuming: {} done, {} remaining", resumed, pending.len());
    }

    let mut last_pct: i64 = -1;
    for (i, query) in pending.iter().enumerate() {
        let outcome = pipeline
            .run_query(query)
            .await
            .with_context(|| format!("Query {} failed", query.query_id))?;
        checkpoint.record(outcome);
        checkpoint.save(report_dir)?;

        let done = resumed + i + 1;
        let pct = (100 * done / total) as i64;
        if pct >= last_pct + 10 || done == total {
            last_pct = pct;
            tracing::info!("Progress: {}/{} ({}%), last: {}", done, total, pct, query.query_id);
        }
    }

    tracing::info!("Done. {} queries in {}", total, report_dir.display());
    Ok(RunProgress {
        total,
        resumed,
        processed: pending.len(),
    })
}
