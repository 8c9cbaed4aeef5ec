//! Remote reranking service client
//!
//! Request: `{"query": "...", "documents": [{"id": "...", "text": "..."}]}`
//! Response: `{"results": [{"id": "...", "score": 0.93}]}`

use super::{sort_by_score, RerankError, Reranker};
use crate::search::SearchResult;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: Vec<RerankDocument<'a>>,
}

#[derive(Debug, Serialize)]
struct RerankDocument<'a> {
    id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankItem>,
}

#[derive(Debug, Deserialize)]
struct RerankItem {
    id: String,
    #[serde(default)]
    score: f64,
}

/// HTTP reranker
pub struct HttpReranker {
    url: String,
    auth_header: Option<(HeaderName, HeaderValue)>,
    client: Client,
}

/// Parse a full header line such as `Authorization: Bearer XXX`
fn parse_auth_header(raw: &str) -> Result<Option<(HeaderName, HeaderValue)>, RerankError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let Some((name, value)) = raw.split_once(':') else {
        tracing::warn!("RERANK_HTTP_AUTH_HEADER has no ':' separator; ignoring it");
        return Ok(None);
    };

    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| RerankError::Config(format!("invalid auth header name: {}", e)))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| RerankError::Config(format!("invalid auth header value: {}", e)))?;
    Ok(Some((name, value)))
}

impl HttpReranker {
    /// Create a client for `url`, optionally sending `auth_header` (`Name: value`)
    pub fn new(url: &str, auth_header: Option<&str>) -> Result<Self, RerankError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RerankError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            auth_header: auth_header.map(parse_auth_header).transpose()?.flatten(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[(String, String)],
    ) -> Result<Vec<SearchResult>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let payload = RerankRequest {
            query,
            documents: candidates
                .iter()
                .map(|(id, text)| RerankDocument { id, text })
                .collect(),
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some((name, value)) = &self.auth_header {
            request = request.header(name.clone(), value.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RerankError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: RerankResponse = response
            .json()
            .await
            .map_err(|e| RerankError::Parse(e.to_string()))?;

        let mut results: Vec<SearchResult> = body
            .results
            .into_iter()
            .map(|item| SearchResult::new(item.id, item.score))
            .collect();
        sort_by_score(&mut results);

        tracing::debug!(candidates = candidates.len(), reranked = results.len(), "http rerank done");
        Ok(results)
    }
}
