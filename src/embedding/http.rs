//! OpenAI-compatible embedding API client
//!
//! Works with any service exposing `POST {base_url}/embeddings`
//! (text-embeddings-inference, vLLM, OpenRouter, OpenAI).

use super::{check_dimensions, normalize, Embedder, EmbeddingError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum characters per text sent for embedding
const MAX_TEXT_CHARS: usize = 6000;

/// Attempts per batch for rate limits and network failures
const MAX_RETRIES: u32 = 3;

/// Request payload for embedding API
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

/// Response from embedding API
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Error response from embedding API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// HTTP embedding client
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    dims: usize,
    api_key: Option<String>,
    client: Client,
    retry_base: Duration,
}

impl HttpEmbedder {
    /// Create a client for `base_url` producing `dims`-dimensional vectors
    pub fn new(base_url: &str, model: &str, dims: usize) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| EmbeddingError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dims,
            api_key: None,
            client,
            retry_base: Duration::from_millis(1000),
        })
    }

    /// Send `Authorization: Bearer <key>` with every request
    pub fn with_api_key(mut self, api_key: Option<&str>) -> Self {
        self.api_key = api_key.map(str::to_string);
        self
    }

    /// Base delay between retries (doubles per attempt)
    pub fn with_retry_base(mut self, delay: Duration) -> Self {
        self.retry_base = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Truncate overly long texts and replace empty ones with a placeholder
    fn prepare_text(text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return "(empty)".to_string();
        }
        trimmed.chars().take(MAX_TEXT_CHARS).collect()
    }

    async fn request_once(&self, url: &str, input: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: input.to_vec(),
        };

        let mut builder = self.client.post(url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            EmbeddingError::Parse(format!("{}. Body preview: {}", e, preview))
        })?;

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index.unwrap_or(0));
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let input: Vec<String> = texts.iter().map(|t| Self::prepare_text(t)).collect();
        let url = format!("{}/embeddings", self.base_url);

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_base * 2u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            match self.request_once(&url, &input).await {
                Ok(mut vectors) => {
                    if vectors.len() != texts.len() {
                        return Err(EmbeddingError::Parse(format!(
                            "expected {} embeddings, got {}",
                            texts.len(),
                            vectors.len()
                        )));
                    }
                    check_dimensions(&vectors, self.dims)?;
                    vectors.iter_mut().for_each(|v| normalize(v));
                    return Ok(vectors);
                }
                Err(err @ EmbeddingError::Network(_)) => {
                    tracing::warn!("Embedding request failed (attempt {}): {}", attempt + 1, err);
                    last_error = Some(err);
                }
                Err(EmbeddingError::Api { status: 429, message }) => {
                    tracing::warn!("Embedding API rate limited (attempt {})", attempt + 1);
                    last_error = Some(EmbeddingError::Api { status: 429, message });
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| EmbeddingError::Network("max retries exceeded".to_string())))
    }
}
