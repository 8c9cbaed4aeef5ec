//! Benchmark record types
//!
//! Documents and queries as stored in `documents.jsonl` and `queries.jsonl`.

use serde::{Deserialize, Serialize};

/// A corpus document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document identifier
    pub doc_id: String,
    /// Document title (boosted in lexical search)
    #[serde(default)]
    pub title: String,
    /// Document body
    #[serde(default)]
    pub body: String,
    /// Optional tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Optional origin of the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    /// Create a document with a title and body
    pub fn new(doc_id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
            source: None,
        }
    }

    /// Text used for embedding and reranking
    pub fn text(&self) -> String {
        compose_text(&self.title, &self.body)
    }
}

/// Join title and body the way documents are embedded and reranked
pub fn compose_text(title: &str, body: &str) -> String {
    format!("{}\n\n{}", title, body)
}

/// A benchmark query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    pub query_id: String,
    pub query: String,
}

impl Query {
    pub fn new(query_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            query: query.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_text() {
        let doc = Document::new("d1", "Title", "Body text");
        assert_eq!(doc.text(), "Title\n\nBody text");
    }

    #[test]
    fn test_document_optional_fields_default() {
        let doc: Document = serde_json::from_str(r#"{"doc_id":"d1","title":"T","body":"B"}"#).unwrap();
        assert!(doc.tags.is_empty());
        assert!(doc.source.is_none());
    }

    #[test]
    fn test_document_serialization_skips_empty_fields() {
        let doc = Document::new("d1", "T", "B");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("tags"));
        assert!(!json.contains("source"));

        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_query_creation() {
        let q = Query::new("q1", "what is rrf");
        assert_eq!(q.query_id, "q1");
        assert_eq!(q.query, "what is rrf");
    }
}
