//! # tessera-linking
//!
//! Relationship discovery for tessera.
//!
//! The [`LinkingEngine`] indexes a document store, runs the rule matchers
//! against one source document, drops duplicates, triages the survivors
//! into auto-apply, review, and reject tiers, and writes auto-applied links
//! back into content. The [`SuggestionManager`] carries review-tier
//! suggestions through the approval lifecycle in persisted batches.

pub mod applier;
pub mod categorizer;
pub mod dedup;
pub mod engine;
pub mod entities;
pub mod index;
pub mod matchers;
pub mod suggestions;
pub mod tags;
pub mod wikilinks;

pub use applier::{has_link, insert_related, link_reason, LinkApplier};
pub use categorizer::{categorize, Categorized};
pub use dedup::{dedup, sort_by_confidence};
pub use engine::{AnalysisResult, LinkingEngine};
pub use entities::{
    CapitalizedPhraseExtractor, EntityExtractor, EntityExtractorChain, EntityKind,
    FrontmatterEntityExtractor, TypedEntity,
};
pub use index::{IndexState, IndexStats};
pub use matchers::{default_matchers, finalize_confidence, MatchContext, Matcher};
pub use suggestions::SuggestionManager;

// Re-export core types
pub use tessera_core::*;
