//! Error taxonomy for the memory engine.
//!
//! Caller mistakes ([`MemoryError::InvalidInput`]) are kept apart from store
//! constraint violations ([`MemoryError::Validation`]) and from infrastructure
//! failures, so the tool layer can decide what to report and what to retry.

/// Errors produced by the store, the retriever, and the save path.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Empty or malformed caller input (e.g. a whitespace-only query).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A store-level constraint was violated (empty text, dimension mismatch, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced memory or history row does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The backing database could not be opened or reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An operation was attempted after [`crate::memory::store::MemoryStore::close`].
    #[error("memory store is closed")]
    StoreClosed,

    /// The embedding or rewrite collaborator failed.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    pub(crate) fn memory_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "memory",
            id: id.to_string(),
        }
    }

    pub(crate) fn history_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "history item",
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
