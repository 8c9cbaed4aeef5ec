//! Embedded sentence-embedding model using FastEmbed

use super::{check_dimensions, normalize, Embedder, EmbeddingError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

/// In-process embedding model
pub struct LocalEmbedder {
    model: TextEmbedding,
    model_name: String,
    dims: usize,
}

fn embedding_model(model_name: &str) -> Result<(EmbeddingModel, usize), EmbeddingError> {
    match model_name {
        "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
            Ok((EmbeddingModel::AllMiniLML6V2, 384))
        }
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        other => Err(EmbeddingError::Config(format!(
            "unsupported local embedding model '{}'. Supported: all-MiniLM-L6-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5",
            other
        ))),
    }
}

impl LocalEmbedder {
    /// Load the named model, downloading it on first use
    pub fn new(model_name: &str, expected_dims: usize) -> Result<Self, EmbeddingError> {
        let (model, dims) = embedding_model(model_name)?;
        if dims != expected_dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: expected_dims,
                actual: dims,
            });
        }

        tracing::info!("Initializing embedding model: {} ({}D)", model_name, dims);
        let init_options = InitOptions::new(model).with_show_download_progress(true);
        let model =
            TextEmbedding::try_new(init_options).map_err(|e| EmbeddingError::Model(e.to_string()))?;

        Ok(Self {
            model,
            model_name: model_name.to_string(),
            dims,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Model(e.to_string()))?;

        check_dimensions(&vectors, self.dims)?;
        vectors.iter_mut().for_each(|v| normalize(v));
        Ok(vectors)
    }
}
