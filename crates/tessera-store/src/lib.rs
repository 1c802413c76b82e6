//! # tessera-store
//!
//! Persistence for tessera: document store implementations the engine reads
//! and writes through, and the durable JSON store holding pending batches,
//! archived batches, and the enhancement queue.

pub mod batches;
pub mod documents;
pub mod json_store;
pub mod queue_store;

pub use batches::{BatchDocument, BatchStore};
pub use documents::{FilesystemDocumentStore, MemoryDocumentStore};
pub use json_store::JsonStore;
pub use queue_store::{QueueDocument, QueueStore};

// Re-export core types
pub use tessera_core::*;
