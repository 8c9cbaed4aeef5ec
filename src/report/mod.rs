//! Report rendering
//!
//! Writes the artifacts of an evaluated run next to `runs.json`:
//! `metrics.json`, `metrics.md`, `latency.md` and the `README.md` run card.

mod run_card;

pub use run_card::{DatasetCounts, RunCard};

use crate::eval::{Cutoffs, MetricReport};
use crate::loader::write_atomic;
use crate::pipeline::LatencySummary;
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Metrics file name
pub const METRICS_JSON: &str = "metrics.json";
/// Metrics table file name
pub const METRICS_MD: &str = "metrics.md";
/// Latency table file name
pub const LATENCY_MD: &str = "latency.md";
/// Run card file name
pub const README_MD: &str = "README.md";

/// Metric reports keyed by system name
pub type SystemMetrics = BTreeMap<String, MetricReport>;

/// A metric to four decimals, or `n/a` when the report lacks it
fn metric(report: &MetricReport, key: &str) -> String {
    report
        .get(key)
        .map_or_else(|| "n/a".to_string(), |value| format!("{:.4}", value))
}

/// Cutoffs shared by every system in `metrics`
///
/// Fails when there are no systems, when a system lacks one of the three
/// metrics, or when systems were evaluated at different cutoffs.
pub fn cutoffs_of(metrics: &SystemMetrics) -> Result<Cutoffs> {
    let mut shared: Option<(&str, Cutoffs)> = None;
    for (system, report) in metrics {
        let cutoffs = Cutoffs::from_report(report).ok_or_else(|| {
            anyhow!(
                "System '{}' in {} lacks ndcg@k, mrr@k or recall@k; rerun `rankeval evaluate`",
                system,
                METRICS_JSON
            )
        })?;
        match shared {
            None => shared = Some((system.as_str(), cutoffs)),
            Some((first, expected)) if expected != cutoffs => {
                return Err(anyhow!(
                    "Systems '{}' and '{}' were evaluated at different cutoffs",
                    first,
                    system
                ));
            }
            Some(_) => {}
        }
    }
    shared
        .map(|(_, cutoffs)| cutoffs)
        .ok_or_else(|| anyhow!("{} holds no systems", METRICS_JSON))
}

/// Markdown table of every system's metrics, four decimals
pub fn metrics_markdown(metrics: &SystemMetrics, cutoffs: Cutoffs) -> String {
    let mut out = String::from("# Experiment Results\n\n");
    out.push_str(&format!(
        "| System | NDCG@{} | MRR@{} | Recall@{} | #Queries |\n",
        cutoffs.ndcg, cutoffs.mrr, cutoffs.recall
    ));
    out.push_str("|---|---:|---:|---:|---:|\n");

    for (system, report) in metrics {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            system,
            metric(report, &cutoffs.ndcg_key()),
            metric(report, &cutoffs.mrr_key()),
            metric(report, &cutoffs.recall_key()),
            report.num_queries
        ));
    }
    out
}

/// Markdown table of per-stage latency (mean, p50, p95 in ms)
pub fn latency_markdown(summary: &LatencySummary) -> String {
    let mut out = format!("# Latency ({} queries)\n\n", summary.num_queries);
    out.push_str("| Stage | Mean (ms) | p50 (ms) | p95 (ms) |\n");
    out.push_str("|---|---:|---:|---:|\n");
    for (stage, stats) in &summary.stages {
        out.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:.2} |\n",
            stage, stats.mean, stats.p50, stats.p95
        ));
    }
    out
}

/// Write `metrics.json` and `metrics.md`
pub fn write_metrics(report_dir: &Path, metrics: &SystemMetrics, cutoffs: Cutoffs) -> Result<()> {
    let json = serde_json::to_string_pretty(metrics)?;
    write_atomic(&report_dir.join(METRICS_JSON), json)?;
    write_atomic(&report_dir.join(METRICS_MD), metrics_markdown(metrics, cutoffs))?;
    tracing::info!("Wrote {}/{{{}, {}}}", report_dir.display(), METRICS_JSON, METRICS_MD);
    Ok(())
}

/// Write `latency.md`
pub fn write_latency(report_dir: &Path, summary: &LatencySummary) -> Result<()> {
    write_atomic(&report_dir.join(LATENCY_MD), latency_markdown(summary))?;
    tracing::info!("Wrote {}", report_dir.join(LATENCY_MD).display());
    Ok(())
}

/// Read `metrics.json` written by [`write_metrics`]
pub fn load_metrics(report_dir: &Path) -> Result<SystemMetrics> {
    let path = report_dir.join(METRICS_JSON);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {:?}; run `rankeval evaluate` first", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}
