//! Collaborator traits the engine depends on.
//!
//! The host supplies a document store and, optionally, a text generator.
//! Everything else the engine owns.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, GeneratedSuggestion};

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Host document store: the only thing the engine needs from the host vault.
///
/// Paths are vault-relative document ids such as `Calendar/2024-01-20 Sync.md`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Raw content of the document at `path`.
    ///
    /// Returns `Error::DocumentNotFound` when the path does not exist.
    async fn read(&self, path: &str) -> Result<String>;

    /// Create or overwrite the document at `path`.
    async fn write(&self, path: &str, content: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Every markdown document in the store, parsed.
    async fn list(&self) -> Result<Vec<Document>>;
}

// =============================================================================
// TEXT GENERATION
// =============================================================================

/// Text-generation collaborator used to enrich a subset of suggestions.
///
/// Treated as unreliable: callers convert every error into a degraded
/// placeholder rather than aborting the surrounding batch.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Propose one relationship for `document`.
    async fn enhance(&self, document: &Document) -> Result<GeneratedSuggestion>;

    /// Free-form generation; returns the non-empty lines of the answer.
    async fn generate_freeform(&self, prompt: &str) -> Result<Vec<String>>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
