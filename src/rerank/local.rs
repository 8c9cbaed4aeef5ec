//! Embedded cross-encoder reranking using FastEmbed

use super::{sort_by_score, RerankError, Reranker};
use crate::search::SearchResult;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};

/// Cross-encoder reranker running in-process
pub struct LocalReranker {
    model: TextRerank,
    model_name: String,
}

fn reranker_model(model_name: &str) -> Result<RerankerModel, RerankError> {
    match model_name {
        "BAAI/bge-reranker-base" | "bge-reranker-base" => Ok(RerankerModel::BGERerankerBase),
        "BAAI/bge-reranker-v2-m3" | "bge-reranker-v2-m3" => Ok(RerankerModel::BGERerankerV2M3),
        "jinaai/jina-reranker-v1-turbo-en" | "jina-reranker-v1-turbo-en" => {
            Ok(RerankerModel::JINARerankerV1TurboEn)
        }
        other => Err(RerankError::Config(format!(
            "unsupported local reranker model '{}'. Supported: BAAI/bge-reranker-base, \
             BAAI/bge-reranker-v2-m3, jinaai/jina-reranker-v1-turbo-en",
            other
        ))),
    }
}

impl LocalReranker {
    /// Load the named model, downloading it on first use
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let model = reranker_model(model_name)?;
        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(model).with_show_download_progress(true);
        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::Model(e.to_string()))?;

        Ok(Self {
            model,
            model_name: model_name.to_string(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Reranker for LocalReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[(String, String)],
    ) -> Result<Vec<SearchResult>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<&str> = candidates.iter().map(|(_, text)| text.as_str()).collect();
        let scored = self
            .model
            .rerank(query, documents, false, None)
            .map_err(|e| RerankError::Model(e.to_string()))?;

        let mut results = Vec::with_capacity(scored.len());
        for item in scored {
            let (doc_id, _) = candidates.get(item.index).ok_or_else(|| {
                RerankError::Model(format!("model returned out-of-range index {}", item.index))
            })?;
            results.push(SearchResult::new(doc_id.clone(), f64::from(item.score)));
        }
        sort_by_score(&mut results);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_rejected() {
        assert!(matches!(
            reranker_model("cross-encoder/unknown"),
            Err(RerankError::Config(_))
        ));
    }

    #[test]
    #[ignore] // Requires model download
    fn test_rerank_prefers_matching_text() {
        let reranker = LocalReranker::new("BAAI/bge-reranker-base").unwrap();
        let candidates = vec![
            ("d1".to_string(), "The weather is nice today.".to_string()),
            ("d2".to_string(), "Paris is the capital of France.".to_string()),
        ];
        let results =
            tokio_test::block_on(reranker.rerank("What is the capital of France?", &candidates))
                .unwrap();
        assert_eq!(results[0].doc_id, "d2");
    }
}
