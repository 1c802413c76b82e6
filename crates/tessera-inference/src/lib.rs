//! # tessera-inference
//!
//! Text-generation collaborators for tessera.
//!
//! This crate provides:
//! - An Ollama chat backend implementing [`TextGenerator`] (default feature `ollama`)
//! - A deterministic mock generator (feature `mock`)
//! - Prompt construction and answer parsing
//! - The per-document enrichment pass that turns generator answers, or
//!   failures, into suggestion items
//!
//! # Example
//!
//! ```rust,no_run
//! use tessera_core::Document;
//! use tessera_inference::{enrich_documents, OllamaGenerator};
//!
//! #[tokio::main]
//! async fn main() -> tessera_core::Result<()> {
//!     let generator = OllamaGenerator::from_env()?;
//!     let docs = vec![Document::parse("Notes/a.md", "# A")];
//!     let items = enrich_documents(&generator, &docs, &docs).await;
//!     println!("{} item(s)", items.len());
//!     Ok(())
//! }
//! ```

pub mod enrichment;
pub mod prompts;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use tessera_core::*;

pub use enrichment::{enrich_documents, TargetResolver};
pub use prompts::{enhancement_prompt, parse_generated};

#[cfg(feature = "ollama")]
pub use ollama::OllamaGenerator;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTextGenerator;
