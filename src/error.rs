//! Validation errors for fusion and evaluation inputs

use thiserror::Error;

/// Precondition violations on in-memory ranking data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// RRF damping constant must be positive
    #[error("RRF damping constant k must be greater than 0")]
    InvalidDampingConstant,

    /// Fusion output cap must be positive
    #[error("fusion output cap must be greater than 0")]
    InvalidOutputCap,

    /// A fusion input list contains the same document twice
    #[error("document '{doc_id}' appears more than once in ranked list #{list}")]
    DuplicateDocument { list: usize, doc_id: String },

    /// A stored run ranks the same document twice for one query
    #[error("system '{system}' ranks document '{doc_id}' more than once for query '{query_id}'")]
    DuplicateInRun {
        system: String,
        query_id: String,
        doc_id: String,
    },
}
