//! # tessera-core
//!
//! Core types, traits, and abstractions for tessera.
//!
//! This crate provides the domain model (documents, link suggestions,
//! suggestion batches, enhancement queue items), the error taxonomy, the
//! collaborator traits the host implements, and the event sink the engine
//! publishes to. The other tessera crates depend on it and re-export it.

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod frontmatter;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use config::{LinkingConfig, QueueConfig, SuggestionConfig};
pub use error::{Error, Result};
pub use events::{EventBus, EventEnvelope, EventSink, LinkEvent, NoOpSink};
pub use frontmatter::{first_heading, split_frontmatter, Frontmatter};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
