//! The linking engine: index, matchers, triage, and auto-apply in one place.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use tessera_core::{
    Document, DocumentStore, EventSink, LinkEvent, LinkHistoryEntry, LinkSuggestion,
    LinkingConfig, NoOpSink, Result,
};

use crate::applier::LinkApplier;
use crate::categorizer::categorize;
use crate::dedup::{dedup, sort_by_confidence};
use crate::entities::EntityExtractorChain;
use crate::index::{IndexState, IndexStats};
use crate::matchers::{default_matchers, MatchContext, Matcher};
use crate::tags::document_tags;

/// Outcome of analyzing one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    pub doc_id: String,
    /// Links written during this pass (empty when auto-apply is off).
    pub auto_applied: Vec<LinkSuggestion>,
    /// Candidates that need a human decision.
    pub review: Vec<LinkSuggestion>,
    pub rejected: Vec<LinkSuggestion>,
    /// Per-link failures from the auto-apply step.
    pub errors: Vec<String>,
}

impl AnalysisResult {
    fn empty(doc_id: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            ..Default::default()
        }
    }
}

/// Relationship discovery over a document store.
pub struct LinkingEngine {
    docs: Arc<dyn DocumentStore>,
    config: LinkingConfig,
    extractors: EntityExtractorChain,
    matchers: Vec<Box<dyn Matcher>>,
    state: RwLock<IndexState>,
    applier: LinkApplier,
    events: Arc<dyn EventSink>,
}

impl LinkingEngine {
    pub fn new(docs: Arc<dyn DocumentStore>, config: LinkingConfig) -> Self {
        Self {
            applier: LinkApplier::new(docs.clone()),
            docs,
            config,
            extractors: EntityExtractorChain::default(),
            matchers: default_matchers(),
            state: RwLock::new(IndexState::default()),
            events: Arc::new(NoOpSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_extractors(mut self, extractors: EntityExtractorChain) -> Self {
        self.extractors = extractors;
        self
    }

    /// Add a matcher after the built-in ones.
    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    pub fn config(&self) -> &LinkingConfig {
        &self.config
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.docs
    }

    /// Rebuild every index from the document store.
    ///
    /// The new state is built without holding the lock and swapped in whole;
    /// link history survives the swap, the applied set is rescanned.
    #[instrument(skip(self), fields(subsystem = "linking", op = "refresh_indices"))]
    pub async fn refresh_indices(&self) -> Result<IndexStats> {
        if !self.config.enabled {
            debug!("Linking disabled, skipping refresh");
            return Ok(IndexStats::default());
        }
        let start = Instant::now();

        let docs = self.docs.list().await?;
        let fresh = IndexState::build(docs, &self.extractors);

        let mut state = self.state.write().await;
        let history = state.take_history();
        *state = fresh.with_history(history);
        let stats = state.stats();

        info!(
            document_count = stats.documents,
            applied_links = stats.applied_links,
            duration_ms = start.elapsed().as_millis() as u64,
            "Indices refreshed"
        );
        Ok(stats)
    }

    /// Resolve a document from the cache, falling back to the store.
    async fn source_document(&self, state: &IndexState, doc_id: &str) -> Result<Document> {
        if let Some(doc) = state.document(doc_id) {
            return Ok(doc.clone());
        }
        let raw = self.docs.read(doc_id).await?;
        Ok(Document::parse(doc_id, &raw))
    }

    /// Every matcher's candidates for `doc_id`, sorted by confidence (stable).
    #[instrument(skip(self), fields(subsystem = "linking", op = "find_candidates"))]
    pub async fn find_candidates(&self, doc_id: &str) -> Result<Vec<LinkSuggestion>> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        let source = self.source_document(&state, doc_id).await?;

        let entities = match state.entities_of(doc_id) {
            Some(cached) => cached.to_vec(),
            None => self.extractors.extract(&source),
        };
        let tags: BTreeSet<String> = match state.tags_of(doc_id) {
            Some(cached) => cached.clone(),
            None => document_tags(&source),
        };

        let ctx = MatchContext {
            source: &source,
            entities: &entities,
            tags: &tags,
            index: &state,
            config: &self.config,
        };
        let mut candidates: Vec<LinkSuggestion> = self
            .matchers
            .iter()
            .flat_map(|m| {
                let found = m.find(&ctx);
                debug!(matcher = m.name(), count = found.len(), "matcher done");
                found
            })
            .filter(|c| c.target_doc_id != doc_id)
            .collect();
        sort_by_confidence(&mut candidates);

        debug!(candidate_count = candidates.len(), "Candidates found");
        Ok(candidates)
    }

    /// Candidates, dedup, categorize, and auto-apply for one document.
    #[instrument(skip(self), fields(subsystem = "linking", op = "analyze_note"))]
    pub async fn analyze_note(&self, doc_id: &str) -> Result<AnalysisResult> {
        if !self.config.enabled {
            return Ok(AnalysisResult::empty(doc_id));
        }

        let candidates = self.find_candidates(doc_id).await?;
        let survivors = {
            let state = self.state.read().await;
            dedup(candidates, state.applied_links())
        };
        let tiers = categorize(survivors, &self.config);

        let mut result = AnalysisResult {
            doc_id: doc_id.to_string(),
            review: tiers.review,
            rejected: tiers.rejected,
            ..Default::default()
        };

        if !self.config.auto_apply {
            // Without auto-apply the confident tier goes to review instead.
            let mut review = tiers.auto_apply;
            review.append(&mut result.review);
            result.review = review;
            return Ok(result);
        }

        let mut written = 0;
        for suggestion in tiers.auto_apply {
            match self.applier.apply(&self.state, &suggestion).await {
                Ok(n) => {
                    written += n;
                    result.auto_applied.push(suggestion);
                }
                Err(e) => {
                    warn!(target = %suggestion.target_doc_id, error = %e, "Auto-apply failed");
                    result
                        .errors
                        .push(format!("{} -> {}: {}", doc_id, suggestion.target_doc_id, e));
                }
            }
        }

        if written > 0 {
            self.events.publish(LinkEvent::LinksApplied {
                source_doc_id: doc_id.to_string(),
                count: written,
            });
        }
        info!(
            auto_applied = result.auto_applied.len(),
            review = result.review.len(),
            rejected = result.rejected.len(),
            "Analysis complete"
        );
        Ok(result)
    }

    /// Apply one approved suggestion through the link applier.
    ///
    /// Returns the number of links written (0 when already present).
    pub async fn apply_suggestion(&self, suggestion: &LinkSuggestion) -> Result<usize> {
        if !self.config.enabled {
            return Ok(0);
        }
        let suggestion = if self.config.bidirectional_links {
            suggestion.clone()
        } else {
            suggestion.clone().with_bidirectional(false)
        };
        let written = self.applier.apply(&self.state, &suggestion).await?;
        if written > 0 {
            self.events.publish(LinkEvent::LinksApplied {
                source_doc_id: suggestion.source_doc_id.clone(),
                count: written,
            });
        }
        Ok(written)
    }

    pub async fn is_applied(&self, source: &str, target: &str) -> bool {
        self.state.read().await.is_applied(source, target)
    }

    pub async fn applied_count(&self) -> usize {
        self.state.read().await.applied_links().len()
    }

    pub async fn link_history(&self) -> Vec<LinkHistoryEntry> {
        self.state.read().await.link_history().to_vec()
    }

    pub async fn stats(&self) -> IndexStats {
        self.state.read().await.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_store::MemoryDocumentStore;

    fn store() -> Arc<MemoryDocumentStore> {
        Arc::new(MemoryDocumentStore::with_documents([
            (
                "Calendar/sync.md",
                "---\ntype: event\nevent_id: evt-42\n---\n# Sync\n",
            ),
            (
                "Notes/sync-notes.md",
                "---\nevent_id: evt-42\n---\n# Sync notes\n",
            ),
            ("Notes/other.md", "# Other\n"),
        ]))
    }

    #[tokio::test]
    async fn disabled_engine_is_noop() {
        let engine = LinkingEngine::new(store(), LinkingConfig::default().with_enabled(false));
        assert_eq!(engine.refresh_indices().await.unwrap(), IndexStats::default());
        let result = engine.analyze_note("Calendar/sync.md").await.unwrap();
        assert!(result.auto_applied.is_empty());
        assert!(engine.find_candidates("Calendar/sync.md").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn analyze_auto_applies_identifier_match() {
        let docs = store();
        let engine = LinkingEngine::new(docs.clone(), LinkingConfig::default());
        engine.refresh_indices().await.unwrap();

        let result = engine.analyze_note("Calendar/sync.md").await.unwrap();
        assert_eq!(result.auto_applied.len(), 1);
        assert!(engine.is_applied("Calendar/sync.md", "Notes/sync-notes.md").await);
        assert!(engine.is_applied("Notes/sync-notes.md", "Calendar/sync.md").await);

        let source = docs.read("Calendar/sync.md").await.unwrap();
        assert!(source.contains("## Related\n- [[Notes/sync-notes]] - ID: evt-42"));
        let target = docs.read("Notes/sync-notes.md").await.unwrap();
        assert!(target.contains("[[Calendar/sync]]"));
        assert_eq!(engine.link_history().await.len(), 2);

        // Second pass finds nothing new.
        let again = engine.analyze_note("Calendar/sync.md").await.unwrap();
        assert!(again.auto_applied.is_empty());
    }

    #[tokio::test]
    async fn refresh_rebuilds_applied_set_from_content() {
        let docs = store();
        let engine = LinkingEngine::new(docs.clone(), LinkingConfig::default());
        engine.refresh_indices().await.unwrap();
        engine.analyze_note("Calendar/sync.md").await.unwrap();

        let fresh = LinkingEngine::new(docs, LinkingConfig::default());
        let stats = fresh.refresh_indices().await.unwrap();
        assert_eq!(stats.applied_links, 2);
        assert!(fresh.is_applied("Calendar/sync.md", "Notes/sync-notes.md").await);
    }

    #[tokio::test]
    async fn auto_apply_off_routes_to_review() {
        let engine = LinkingEngine::new(store(), LinkingConfig::default().with_auto_apply(false));
        engine.refresh_indices().await.unwrap();
        let result = engine.analyze_note("Calendar/sync.md").await.unwrap();
        assert!(result.auto_applied.is_empty());
        assert_eq!(result.review.len(), 1);
        assert_eq!(engine.applied_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let engine = LinkingEngine::new(store(), LinkingConfig::default());
        engine.refresh_indices().await.unwrap();
        let err = engine.analyze_note("missing.md").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
