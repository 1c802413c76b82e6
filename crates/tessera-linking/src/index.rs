//! Document index: the engine's whole in-memory view of the corpus.
//!
//! [`IndexState`] bundles the entity index, the tag index, the document
//! cache, the applied-link set, and the link history. It is rebuilt as a
//! unit by [`IndexState::build`] and swapped in whole, so matchers never see
//! a half-built index.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use tessera_core::{link_key, Document, LinkHistoryEntry, LinkSuggestion};

use crate::entities::{EntityExtractorChain, TypedEntity};
use crate::tags::document_tags;
use crate::wikilinks::{extract_wikilink_targets, LinkResolver};

/// Index sizes, for logging and the harness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub entities: usize,
    pub tags: usize,
    pub applied_links: usize,
    pub history: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IndexState {
    entity_index: HashMap<String, BTreeSet<String>>,
    tag_index: HashMap<String, BTreeSet<String>>,
    documents: BTreeMap<String, Document>,
    applied_links: HashSet<String>,
    link_history: Vec<LinkHistoryEntry>,
    doc_entities: HashMap<String, Vec<TypedEntity>>,
    doc_tags: HashMap<String, BTreeSet<String>>,
}

impl IndexState {
    /// Full rebuild over the corpus.
    ///
    /// The applied-link set is reconstructed from the wikilinks present in
    /// document content, not carried over.
    pub fn build(docs: Vec<Document>, extractors: &EntityExtractorChain) -> Self {
        let mut state = IndexState::default();

        let resolver = LinkResolver::new(&docs);
        for doc in &docs {
            for target in extract_wikilink_targets(&doc.content) {
                if let Some(target_id) = resolver.resolve(&target) {
                    if target_id != doc.id {
                        state.applied_links.insert(link_key(&doc.id, target_id));
                    }
                }
            }
        }

        for doc in docs {
            let entities = extractors.extract(&doc);
            for entity in &entities {
                state
                    .entity_index
                    .entry(entity.key())
                    .or_default()
                    .insert(doc.id.clone());
            }

            let tags = document_tags(&doc);
            for tag in &tags {
                state
                    .tag_index
                    .entry(tag.clone())
                    .or_default()
                    .insert(doc.id.clone());
            }

            state.doc_entities.insert(doc.id.clone(), entities);
            state.doc_tags.insert(doc.id.clone(), tags);
            state.documents.insert(doc.id.clone(), doc);
        }

        debug!(
            document_count = state.documents.len(),
            entities = state.entity_index.len(),
            tags = state.tag_index.len(),
            applied = state.applied_links.len(),
            "Index built"
        );
        state
    }

    /// Carry link history over from a previous state.
    pub fn with_history(mut self, history: Vec<LinkHistoryEntry>) -> Self {
        self.link_history = history;
        self
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Cached documents in id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn entities_of(&self, id: &str) -> Option<&[TypedEntity]> {
        self.doc_entities.get(id).map(Vec::as_slice)
    }

    pub fn tags_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.doc_tags.get(id)
    }

    /// Documents holding the entity with index key `key`.
    pub fn docs_with_entity(&self, key: &str) -> impl Iterator<Item = &String> {
        self.entity_index.get(key).into_iter().flatten()
    }

    pub fn docs_with_tag(&self, tag: &str) -> impl Iterator<Item = &String> {
        self.tag_index.get(tag).into_iter().flatten()
    }

    pub fn applied_links(&self) -> &HashSet<String> {
        &self.applied_links
    }

    pub fn is_applied(&self, source: &str, target: &str) -> bool {
        self.applied_links.contains(&link_key(source, target))
    }

    /// Record a materialized link. Only pairs not yet recorded reach the history.
    pub fn record_applied(&mut self, suggestion: &LinkSuggestion) {
        if !self.applied_links.insert(suggestion.forward_key()) {
            return;
        }
        self.link_history.push(LinkHistoryEntry {
            source_doc_id: suggestion.source_doc_id.clone(),
            target_doc_id: suggestion.target_doc_id.clone(),
            link_type: suggestion.link_type,
            confidence: suggestion.confidence,
            applied_at: Utc::now(),
        });
    }

    pub fn link_history(&self) -> &[LinkHistoryEntry] {
        &self.link_history
    }

    pub fn take_history(&mut self) -> Vec<LinkHistoryEntry> {
        std::mem::take(&mut self.link_history)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.documents.len(),
            entities: self.entity_index.len(),
            tags: self.tag_index.len(),
            applied_links: self.applied_links.len(),
            history: self.link_history.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Evidence, LinkType};

    fn corpus() -> Vec<Document> {
        vec![
            Document::parse(
                "Finance/coffee.md",
                "---\ntype: transaction\nmerchant: Blue Bottle\ntags: [food, morning]\n---\nSee [[Calendar/standup]]\n",
            ),
            Document::parse(
                "Calendar/standup.md",
                "---\ntype: event\nlocation: Blue Bottle\n---\n#morning #work\n",
            ),
            Document::parse("Notes/empty.md", "nothing here [[Missing]]"),
        ]
    }

    #[test]
    fn build_indexes_entities_and_tags() {
        let state = IndexState::build(corpus(), &EntityExtractorChain::default());
        let merchants: Vec<_> = state.docs_with_entity("merchant:blue bottle").collect();
        assert_eq!(merchants, vec!["Finance/coffee.md"]);
        let morning: Vec<_> = state.docs_with_tag("morning").collect();
        assert_eq!(morning.len(), 2);
        assert_eq!(state.stats().documents, 3);
        assert!(state.tags_of("Calendar/standup.md").unwrap().contains("work"));
    }

    #[test]
    fn build_rebuilds_applied_set_from_wikilinks() {
        let state = IndexState::build(corpus(), &EntityExtractorChain::default());
        assert!(state.is_applied("Finance/coffee.md", "Calendar/standup.md"));
        assert!(!state.is_applied("Calendar/standup.md", "Finance/coffee.md"));
        assert_eq!(state.applied_links().len(), 1);
    }

    #[test]
    fn record_applied_appends_history() {
        let mut state = IndexState::build(corpus(), &EntityExtractorChain::default());
        let s = LinkSuggestion::new(
            "Notes/empty.md",
            "Finance/coffee.md",
            LinkType::EntityBased,
            0.9,
            Evidence::rule("shared-entity"),
        );
        state.record_applied(&s);
        assert!(state.is_applied("Notes/empty.md", "Finance/coffee.md"));
        assert_eq!(state.link_history().len(), 1);

        // Re-recording the same pair leaves the history alone.
        state.record_applied(&s);
        assert_eq!(state.link_history().len(), 1);

        let history = state.take_history();
        let rebuilt = IndexState::build(corpus(), &EntityExtractorChain::default())
            .with_history(history);
        assert_eq!(rebuilt.link_history().len(), 1);
        assert!(!rebuilt.is_applied("Notes/empty.md", "Finance/coffee.md"));
    }
}
