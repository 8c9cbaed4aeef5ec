//! Embedding module
//!
//! Maps query and document text to L2-normalized vectors for kNN search.
//! The backend is chosen once from configuration: an OpenAI-compatible
//! embeddings endpoint when `EMBED_HTTP_URL` is set, otherwise the embedded
//! model (requires the `local-models` feature).

mod http;
#[cfg(feature = "local-models")]
mod local;

pub use http::HttpEmbedder;
#[cfg(feature = "local-models")]
pub use local::LocalEmbedder;

use crate::config::AppConfig;
use std::future::Future;
use thiserror::Error;

/// Embedding errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network error (connection failed, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (4xx/5xx responses)
    #[error("Embedding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response parsing error
    #[error("Failed to parse embedding response: {0}")]
    Parse(String),

    /// Model initialization or inference failure
    #[error("Embedding model failed: {0}")]
    Model(String),

    /// Vector size differs from the index mapping
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Backend cannot be built from the configuration
    #[error("Invalid embedding configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Network(err.to_string())
    }
}

/// Text embedding capability
pub trait Embedder: Send + Sync {
    /// Embed several texts, returning one normalized vector per text
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// Embed a single text
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send {
        let texts = vec![text.to_string()];
        async move {
            self.embed_batch(&texts)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| EmbeddingError::Parse("no embedding returned".to_string()))
        }
    }
}

/// Scale a vector to unit length; the zero vector is left unchanged
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Check every vector has the expected dimension
pub(crate) fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<(), EmbeddingError> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: v.len(),
        }),
        None => Ok(()),
    }
}

/// Embedder selected from configuration
pub enum EmbeddingBackend {
    Http(HttpEmbedder),
    #[cfg(feature = "local-models")]
    Local(LocalEmbedder),
}

impl EmbeddingBackend {
    /// Build the configured backend
    pub fn from_config(config: &AppConfig) -> Result<Self, EmbeddingError> {
        if let Some(url) = config.embed_http_url() {
            tracing::info!("Using embedding endpoint {} ({})", url, config.embedding_model());
            let embedder = HttpEmbedder::new(url, config.embedding_model(), config.embed_dims())?
                .with_api_key(config.embed_api_key());
            return Ok(EmbeddingBackend::Http(embedder));
        }

        Self::local(config)
    }

    #[cfg(feature = "local-models")]
    fn local(config: &AppConfig) -> Result<Self, EmbeddingError> {
        let embedder = LocalEmbedder::new(config.embedding_model(), config.embed_dims())?;
        Ok(EmbeddingBackend::Local(embedder))
    }

    #[cfg(not(feature = "local-models"))]
    fn local(_config: &AppConfig) -> Result<Self, EmbeddingError> {
        Err(EmbeddingError::Config(
            "set EMBED_HTTP_URL or build with `--features local-models`".to_string(),
        ))
    }
}

impl Embedder for EmbeddingBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            EmbeddingBackend::Http(embedder) => embedder.embed_batch(texts).await,
            #[cfg(feature = "local-models")]
            EmbeddingBackend::Local(embedder) => embedder.embed_batch(texts).await,
        }
    }
}
