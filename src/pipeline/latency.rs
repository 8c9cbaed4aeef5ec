//! Per-query stage latencies
//!
//! Stored as `latency.csv` with the header
//! `query_id,bm25_ms,knn_ms,fusion_ms,rerank_ms,total_ms`.

use crate::loader::write_atomic;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CSV header line
pub const LATENCY_HEADER: &str = "query_id,bm25_ms,knn_ms,fusion_ms,rerank_ms,total_ms";

/// Stage timings of one query, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRow {
    pub query_id: String,
    pub bm25_ms: f64,
    pub knn_ms: f64,
    pub fusion_ms: f64,
    pub rerank_ms: f64,
    pub total_ms: f64,
}

impl LatencyRow {
    /// Build a row; `total_ms` is the sum of the four stages
    pub fn new(query_id: impl Into<String>, bm25_ms: f64, knn_ms: f64, fusion_ms: f64, rerank_ms: f64) -> Self {
        Self {
            query_id: query_id.into(),
            bm25_ms,
            knn_ms,
            fusion_ms,
            rerank_ms,
            total_ms: bm25_ms + knn_ms + fusion_ms + rerank_ms,
        }
    }

    fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            quote_field(&self.query_id),
            self.bm25_ms,
            self.knn_ms,
            self.fusion_ms,
            self.rerank_ms,
            self.total_ms
        )
    }

    fn from_csv_line(line: &str) -> Result<Self> {
        // Numeric columns never contain commas, so split from the right
        let mut fields: Vec<&str> = line.rsplitn(6, ',').collect();
        if fields.len() != 6 {
            return Err(anyhow!("expected 6 fields, got {}", fields.len()));
        }
        fields.reverse();

        let number = |idx: usize| -> Result<f64> {
            fields[idx]
                .trim()
                .parse()
                .with_context(|| format!("invalid number {:?}", fields[idx]))
        };

        Ok(Self {
            query_id: unquote_field(fields[0]),
            bm25_ms: number(1)?,
            knn_ms: number(2)?,
            fusion_ms: number(3)?,
            rerank_ms: number(4)?,
            total_ms: number(5)?,
        })
    }
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn unquote_field(field: &str) -> String {
    match field.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

/// Render rows as CSV text, header included
pub fn to_csv(rows: &[LatencyRow]) -> String {
    let mut out = String::from(LATENCY_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row.to_csv_line());
        out.push('\n');
    }
    out
}

/// Parse CSV text written by [`to_csv`]
pub fn from_csv(content: &str) -> Result<Vec<LatencyRow>> {
    let mut lines = content.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim_end_matches('\r') == LATENCY_HEADER => {}
        Some((_, header)) => return Err(anyhow!("unexpected latency header: {:?}", header)),
        None => return Ok(Vec::new()),
    }

    lines
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            LatencyRow::from_csv_line(line.trim_end_matches('\r'))
                .with_context(|| format!("latency line {}", idx + 1))
        })
        .collect()
}

/// Write rows to `path` atomically
pub fn save_csv(path: &Path, rows: &[LatencyRow]) -> Result<()> {
    write_atomic(path, to_csv(rows))
}

/// Read rows from `path`
pub fn load_csv(path: &Path) -> Result<Vec<LatencyRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read latency from {:?}", path))?;
    from_csv(&content).with_context(|| format!("Failed to parse {:?}", path))
}

/// Distribution of one stage's latency
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageSummary {
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Latency distribution of every stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub num_queries: usize,
    pub stages: Vec<(&'static str, StageSummary)>,
}

/// Nearest-rank percentile of sorted values (`p` in 0..=100)
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn summarize_stage(mut values: Vec<f64>) -> StageSummary {
    values.sort_by(f64::total_cmp);
    let mean = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };
    StageSummary {
        mean,
        p50: percentile(&values, 50.0),
        p95: percentile(&values, 95.0),
    }
}

/// Mean, p50 and p95 per stage
pub fn summarize(rows: &[LatencyRow]) -> LatencySummary {
    let stage = |f: fn(&LatencyRow) -> f64| summarize_stage(rows.iter().map(f).collect());
    LatencySummary {
        num_queries: rows.len(),
        stages: vec![
            ("bm25", stage(|r| r.bm25_ms)),
            ("knn", stage(|r| r.knn_ms)),
            ("fusion", stage(|r| r.fusion_ms)),
            ("rerank", stage(|r| r.rerank_ms)),
            ("total", stage(|r| r.total_ms)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_sum_of_stages() {
        let row = LatencyRow::new("q1", 1.5, 2.0, 0.25, 10.0);
        assert!((row.total_ms - 13.75).abs() < 1e-12);
    }

    #[test]
    fn test_csv_roundtrip_with_quoted_id() {
        let rows = vec![
            LatencyRow::new("q1", 1.0, 2.0, 0.5, 3.0),
            LatencyRow::new("q,\"2\"", 4.0, 5.0, 0.1, 6.0),
        ];
        let csv = to_csv(&rows);
        assert!(csv.starts_with(LATENCY_HEADER));
        assert!(csv.contains("\"q,\"\"2\"\"\""));
        assert_eq!(from_csv(&csv).unwrap(), rows);
    }

    #[test]
    fn test_from_csv_empty_and_header_only() {
        assert!(from_csv("").unwrap().is_empty());
        assert!(from_csv(&format!("{}\n", LATENCY_HEADER)).unwrap().is_empty());
    }

    #[test]
    fn test_from_csv_rejects_bad_rows() {
        assert!(from_csv("id,ms\nq1,1").is_err());
        let bad = format!("{}\nq1,1,2,x,4,5\n", LATENCY_HEADER);
        assert!(from_csv(&bad).is_err());
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(percentile(&values, 50.0), 10.0);
        assert_eq!(percentile(&values, 95.0), 19.0);
        assert_eq!(percentile(&[7.0], 95.0), 7.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_summarize() {
        let rows = vec![
            LatencyRow::new("q1", 1.0, 1.0, 1.0, 1.0),
            LatencyRow::new("q2", 3.0, 1.0, 1.0, 1.0),
        ];
        let summary = summarize(&rows);
        assert_eq!(summary.num_queries, 2);
        let (name, bm25) = summary.stages[0];
        assert_eq!(name, "bm25");
        assert!((bm25.mean - 2.0).abs() < 1e-12);
        assert_eq!(bm25.p50, 1.0);
        assert_eq!(bm25.p95, 3.0);
    }
}
