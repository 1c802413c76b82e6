//! Error types for tessera.

use thiserror::Error;
use uuid::Uuid;

use crate::models::SuggestionStatus;

/// Result type alias using tessera's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tessera operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Suggestion id is not held by any active batch
    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(Uuid),

    /// Batch id is not present in the pending store
    #[error("Batch not found: {0}")]
    BatchNotFound(Uuid),

    /// Document path could not be resolved by the document store
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Feature flag is off; callers treat this as a no-op success
    #[error("Disabled: {0}")]
    Disabled(String),

    /// Durable store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Text-generation collaborator failed for one document
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Suggestion status change not allowed by the lifecycle
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: SuggestionStatus,
        to: SuggestionStatus,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for every "could not resolve an id" variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::SuggestionNotFound(_)
                | Error::BatchNotFound(_)
                | Error::DocumentNotFound(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
