//! `README.md` run card describing one benchmark run

use super::{metric, SystemMetrics};
use crate::config::{AppConfig, RetrievalConfig};
use crate::eval::Cutoffs;
use chrono::{DateTime, Utc};

/// Sizes of the benchmark dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatasetCounts {
    pub documents: usize,
    pub queries: usize,
    pub qrels: usize,
}

/// Everything the run card shows
#[derive(Debug, Clone)]
pub struct RunCard {
    pub dataset_name: String,
    pub data_path: String,
    pub counts: DatasetCounts,
    pub embedding_model: String,
    pub embed_dims: usize,
    pub reranker: String,
    pub retrieval: RetrievalConfig,
    pub cutoffs: Cutoffs,
    pub metrics: SystemMetrics,
    pub generated_at: DateTime<Utc>,
}

/// `1234567` -> `1,234,567`
fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl RunCard {
    /// Card for `config`'s dataset, stamped with the current time
    pub fn new(config: &AppConfig, counts: DatasetCounts, metrics: SystemMetrics, cutoffs: Cutoffs) -> Self {
        let data_path = config.data_dir().to_string();
        let dataset_name = std::path::Path::new(&data_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "data".to_string());
        let reranker = match config.rerank_mode() {
            crate::rerank::RerankMode::Local => config.reranker_model().to_string(),
            crate::rerank::RerankMode::Http => {
                format!("HTTP ({})", config.rerank_http_url().unwrap_or("unset"))
            }
        };

        Self {
            dataset_name,
            data_path,
            counts,
            embedding_model: config.embedding_model().to_string(),
            embed_dims: config.embed_dims(),
            reranker,
            retrieval: *config.retrieval(),
            cutoffs,
            metrics,
            generated_at: Utc::now(),
        }
    }

    /// Render the card as markdown
    pub fn render(&self) -> String {
        let c = &self.cutoffs;
        let r = &self.retrieval;

        let mut out = format!("# {}: Run Specs\n\n", self.dataset_name);
        out.push_str(&format!("Experiment run on `{}`.\n", self.data_path));
        out.push_str(&format!(
            "Generated {}.\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        out.push_str("## Dataset\n\n| Item | Count |\n|------|------:|\n");
        out.push_str(&format!("| Documents | {} |\n", with_thousands(self.counts.documents)));
        out.push_str(&format!("| Queries | {} |\n", with_thousands(self.counts.queries)));
        out.push_str(&format!("| Qrels | {} |\n", with_thousands(self.counts.qrels)));

        out.push_str("\n## Models\n\n| Component | Model |\n|-----------|-------|\n");
        out.push_str(&format!("| Embedding | {} ({}d) |\n", self.embedding_model, self.embed_dims));
        out.push_str(&format!("| Reranker | {} |\n", self.reranker));

        out.push_str("\n## Retrieval Config\n\n| Param | Value |\n|-------|------:|\n");
        out.push_str(&format!("| BM25/kNN top-n | {} |\n", r.topn));
        out.push_str(&format!("| kNN num_candidates | {} |\n", r.knn_candidates));
        out.push_str(&format!("| RRF k | {} |\n", r.rrf_k));
        out.push_str(&format!("| Rerank top-n | {} |\n", r.rerank_topn));
        out.push_str("\nBM25 fields: `title^2`, `body`. Vector similarity: cosine.\n");

        out.push_str("\n## Results\n\n");
        out.push_str(&format!(
            "| System | NDCG@{} | MRR@{} | Recall@{} |\n",
            c.ndcg, c.mrr, c.recall
        ));
        out.push_str("|--------|--------:|-------:|----------:|\n");
        for (system, report) in &self.metrics {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                system,
                metric(report, &c.ndcg_key()),
                metric(report, &c.mrr_key()),
                metric(report, &c.recall_key())
            ));
        }

        out.push_str("\n## Outputs\n\n");
        out.push_str("- `runs.json`: ranked doc IDs per query per system\n");
        out.push_str("- `latency.csv`: per-query latency breakdown (bm25_ms, knn_ms, fusion_ms, rerank_ms)\n");
        out.push_str("- `latency.md`: mean, p50 and p95 per stage\n");
        out.push_str("- `metrics.json` / `metrics.md`: aggregated metrics\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MetricReport;
    use std::collections::BTreeMap;

    #[test]
    fn test_with_thousands() {
        assert_eq!(with_thousands(0), "0");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1000), "1,000");
        assert_eq!(with_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_render_contains_sections() {
        let mut metrics = SystemMetrics::new();
        let mut values = BTreeMap::new();
        values.insert("ndcg@10".to_string(), 0.5);
        values.insert("mrr@10".to_string(), 0.25);
        values.insert("recall@50".to_string(), 1.0);
        metrics.insert(
            "hybrid_rrf".to_string(),
            MetricReport {
                metrics: values,
                num_queries: 2,
            },
        );

        let config = AppConfig::default().with_data_dir("dataset/data_lite");
        let counts = DatasetCounts {
            documents: 12000,
            queries: 50,
            qrels: 321,
        };
        let card = RunCard::new(&config, counts, metrics, Cutoffs::default()).render();

        assert!(card.starts_with("# data_lite: Run Specs"));
        assert!(card.contains("| Documents | 12,000 |"));
        assert!(card.contains("| Embedding | sentence-transformers/all-MiniLM-L6-v2 (384d) |"));
        assert!(card.contains("| Reranker | BAAI/bge-reranker-base |"));
        assert!(card.contains("| RRF k | 60 |"));
        assert!(card.contains("| hybrid_rrf | 0.5000 | 0.2500 | 1.0000 |"));
        assert!(card.contains("Experiment run on `dataset/data_lite`.\n"));
    }

    #[test]
    fn test_render_uses_evaluated_cutoffs() {
        let mut values = BTreeMap::new();
        values.insert("ndcg@5".to_string(), 0.75);
        values.insert("mrr@10".to_string(), 0.5);
        values.insert("recall@50".to_string(), 1.0);
        let mut metrics = SystemMetrics::new();
        metrics.insert(
            "bm25".to_string(),
            MetricReport {
                metrics: values,
                num_queries: 4,
            },
        );

        let cutoffs = crate::report::cutoffs_of(&metrics).unwrap();
        let card = RunCard::new(&AppConfig::default(), DatasetCounts::default(), metrics, cutoffs).render();

        assert!(card.contains("| System | NDCG@5 | MRR@10 | Recall@50 |"));
        assert!(card.contains("| bm25 | 0.7500 | 0.5000 | 1.0000 |"));
    }
}
