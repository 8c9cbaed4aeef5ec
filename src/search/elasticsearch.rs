//! Elasticsearch search backend
//!
//! Talks to the REST API directly:
//! - `PUT /{index}` with a `dense_vector` (cosine) mapping
//! - `POST /_bulk?refresh=true` for indexing
//! - `POST /{index}/_search` with `multi_match` or `knn`
//! - `POST /{index}/_mget` for document texts

use super::backend::{BackendError, SearchBackend};
use crate::config::AppConfig;
use crate::loader::{compose_text, Document};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Documents per `_bulk` request
const BULK_CHUNK_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct MgetResponse {
    #[serde(default)]
    docs: Vec<MgetDoc>,
}

#[derive(Debug, Deserialize)]
struct MgetDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<StoredText>,
}

#[derive(Debug, Deserialize)]
struct StoredText {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

/// Elasticsearch client bound to one index
pub struct ElasticsearchBackend {
    base_url: String,
    index: String,
    api_key: Option<String>,
    client: Client,
}

impl ElasticsearchBackend {
    /// Create a client for `base_url`, authenticating with `api_key` if given
    pub fn new(base_url: &str, index: &str, api_key: Option<&str>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| BackendError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            api_key: api_key.map(str::to_string),
            client,
        })
    }

    /// Create a client from `ES_URL`, `INDEX_NAME` and `ES_API_KEY` settings
    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        Self::new(config.es_url(), config.index_name(), config.es_api_key())
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("ApiKey {}", key)),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn search_ids(&self, body: Value) -> Result<Vec<String>, BackendError> {
        let request = self.client.post(self.url(&format!("{}/_search", self.index)));
        let response = self.authorize(request).json(&body).send().await?;
        let parsed: SearchResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(parsed.hits.hits.into_iter().map(|h| h.id).collect())
    }

    /// Drop the index if it exists and create it with the benchmark mapping
    pub async fn create_index(&self, dims: usize) -> Result<(), BackendError> {
        let request = self.client.delete(self.url(&self.index));
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Index {} did not exist", self.index);
        } else {
            Self::check(response).await?;
            tracing::info!("Deleted existing index: {}", self.index);
        }

        let mapping = json!({
            "mappings": {
                "properties": {
                    "doc_id": {"type": "keyword"},
                    "title": {"type": "text"},
                    "body": {"type": "text"},
                    "tags": {"type": "keyword"},
                    "source": {"type": "keyword"},
                    "embedding": {
                        "type": "dense_vector",
                        "dims": dims,
                        "index": true,
                        "similarity": "cosine"
                    }
                }
            }
        });

        let request = self.client.put(self.url(&self.index));
        let response = self.authorize(request).json(&mapping).send().await?;
        Self::check(response).await?;
        tracing::info!("Created index: {} ({} dims)", self.index, dims);
        Ok(())
    }

    /// Index documents with their embeddings, refreshing after each batch
    ///
    /// Returns the number of documents indexed.
    pub async fn bulk_index(
        &self,
        documents: &[Document],
        vectors: &[Vec<f32>],
    ) -> Result<usize, BackendError> {
        if documents.len() != vectors.len() {
            return Err(BackendError::Config(format!(
                "{} documents but {} vectors",
                documents.len(),
                vectors.len()
            )));
        }

        for (docs, vecs) in documents
            .chunks(BULK_CHUNK_SIZE)
            .zip(vectors.chunks(BULK_CHUNK_SIZE))
        {
            let mut ndjson = String::new();
            for (doc, vector) in docs.iter().zip(vecs) {
                let action = json!({"index": {"_index": self.index, "_id": doc.doc_id}});
                let mut source = serde_json::to_value(doc)
                    .map_err(|e| BackendError::Parse(e.to_string()))?;
                source["embedding"] = json!(vector);
                ndjson.push_str(&action.to_string());
                ndjson.push('\n');
                ndjson.push_str(&source.to_string());
                ndjson.push('\n');
            }

            let request = self
                .client
                .post(self.url("_bulk?refresh=true"))
                .header("Content-Type", "application/x-ndjson")
                .body(ndjson);
            let response = self.authorize(request).send().await?;
            let parsed: BulkResponse = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| BackendError::Parse(e.to_string()))?;

            if parsed.errors {
                let first = parsed
                    .items
                    .iter()
                    .find_map(|item| item.get("index")?.get("error").cloned())
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown bulk error".to_string());
                return Err(BackendError::Api {
                    status: 400,
                    message: first,
                });
            }
            tracing::debug!("Bulk indexed {} documents", docs.len());
        }

        tracing::info!("Indexed {} documents into {}", documents.len(), self.index);
        Ok(documents.len())
    }
}

impl SearchBackend for ElasticsearchBackend {
    async fn lexical_search(&self, query: &str, topn: usize) -> Result<Vec<String>, BackendError> {
        self.search_ids(json!({
            "size": topn,
            "_source": false,
            "query": {"multi_match": {"query": query, "fields": ["title^2", "body"]}}
        }))
        .await
    }

    async fn vector_search(
        &self,
        vector: &[f32],
        topn: usize,
        num_candidates: usize,
    ) -> Result<Vec<String>, BackendError> {
        self.search_ids(json!({
            "size": topn,
            "_source": false,
            "knn": {
                "field": "embedding",
                "query_vector": vector,
                "k": topn,
                "num_candidates": num_candidates
            }
        }))
        .await
    }

    async fn fetch_texts(&self, doc_ids: &[String]) -> Result<HashMap<String, String>, BackendError> {
        if doc_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let request = self.client.post(self.url(&format!("{}/_mget", self.index)));
        let response = self
            .authorize(request)
            .json(&json!({"ids": doc_ids}))
            .send()
            .await?;
        let parsed: MgetResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        Ok(parsed
            .docs
            .into_iter()
            .filter(|doc| doc.found)
            .filter_map(|doc| {
                let source = doc.source?;
                Some((doc.id, compose_text(&source.title, &source.body)))
            })
            .collect())
    }
}
