//! Suggestion batch lifecycle: create, decide, apply, archive.
//!
//! Every mutation goes through [`BatchStore`] under its path lock and is
//! followed by an archive sweep, so a batch leaves the pending store as soon
//! as all of its items are rejected or applied.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use tessera_core::{
    ApplyReport, BatchType, Error, EventSink, LinkEvent, NoOpSink, Result, SuggestionBatch,
    SuggestionConfig, SuggestionItem, SuggestionStatus,
};
use tessera_store::BatchStore;

use crate::engine::{AnalysisResult, LinkingEngine};

/// Owns the `pending -> approved -> applied` / `pending -> rejected` lifecycle.
pub struct SuggestionManager {
    store: BatchStore,
    engine: Arc<LinkingEngine>,
    config: SuggestionConfig,
    events: Arc<dyn EventSink>,
}

impl SuggestionManager {
    pub fn new(store: BatchStore, engine: Arc<LinkingEngine>, config: SuggestionConfig) -> Self {
        Self {
            store: store.with_archive_cap(config.archive_cap),
            engine,
            config,
            events: Arc::new(NoOpSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn engine(&self) -> &Arc<LinkingEngine> {
        &self.engine
    }

    /// Persist a new batch after the auto-approval sweep.
    ///
    /// Items at or above the configured threshold are approved before the
    /// batch is written. An empty item list is rejected.
    #[instrument(skip(self, items), fields(subsystem = "suggestions", op = "create_batch", batch_type = batch_type.as_str()))]
    pub async fn create_batch(
        &self,
        batch_type: BatchType,
        source_operation: &str,
        mut items: Vec<SuggestionItem>,
    ) -> Result<SuggestionBatch> {
        if items.is_empty() {
            return Err(Error::InvalidInput("batch has no suggestions".to_string()));
        }

        let mut auto_approved = 0;
        if self.config.auto_approve {
            for item in items.iter_mut().filter(|i| {
                i.status == SuggestionStatus::Pending
                    && i.target_doc_id.is_some()
                    && i.confidence >= self.config.high_confidence_threshold
            }) {
                item.transition(SuggestionStatus::Approved)?;
                auto_approved += 1;
            }
        }

        let batch = SuggestionBatch::new(batch_type, source_operation, items);
        self.store.store_batch(&batch).await?;

        info!(
            batch_id = %batch.id,
            suggestion_count = batch.suggestions.len(),
            auto_approved,
            "Batch created"
        );
        self.events.publish(LinkEvent::BatchCreated {
            batch_id: batch.id,
            suggestion_count: batch.suggestions.len(),
            auto_approved,
        });

        self.archive_settled().await?;
        Ok(batch)
    }

    /// Wrap the review tier of an analysis into a batch. `None` when there
    /// is nothing to review.
    pub async fn batch_from_analysis(
        &self,
        result: &AnalysisResult,
    ) -> Result<Option<SuggestionBatch>> {
        if result.review.is_empty() {
            return Ok(None);
        }
        let items = result
            .review
            .iter()
            .cloned()
            .map(SuggestionItem::from)
            .collect();
        let operation = format!("analyze:{}", result.doc_id);
        self.create_batch(BatchType::NoteAnalysis, &operation, items)
            .await
            .map(Some)
    }

    pub async fn pending_batches(&self) -> Result<Vec<SuggestionBatch>> {
        self.store.load_pending().await
    }

    pub async fn archived_batches(&self) -> Result<Vec<SuggestionBatch>> {
        self.store.load_archived().await
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> Result<SuggestionBatch> {
        self.store.get(batch_id).await
    }

    /// Every item still awaiting a decision, across all pending batches.
    pub async fn pending_suggestions(&self) -> Result<Vec<SuggestionItem>> {
        Ok(self
            .store
            .load_pending()
            .await?
            .into_iter()
            .flat_map(|b| b.suggestions)
            .filter(|s| s.status == SuggestionStatus::Pending)
            .collect())
    }

    async fn transition(&self, suggestion_id: Uuid, next: SuggestionStatus) -> Result<SuggestionBatch> {
        let (batch, _) = self
            .store
            .modify_by_suggestion(suggestion_id, |batch| {
                batch
                    .find_mut(suggestion_id)
                    .ok_or(Error::SuggestionNotFound(suggestion_id))?
                    .transition(next)?;
                batch.recompute();
                Ok(())
            })
            .await?;

        debug!(
            suggestion_id = %suggestion_id,
            batch_id = %batch.id,
            status = next.as_str(),
            batch_status = ?batch.batch_status,
            "Suggestion transitioned"
        );
        self.archive_settled().await?;
        Ok(batch)
    }

    #[instrument(skip(self), fields(subsystem = "suggestions", op = "approve"))]
    pub async fn approve_suggestion(&self, suggestion_id: Uuid) -> Result<SuggestionBatch> {
        self.transition(suggestion_id, SuggestionStatus::Approved).await
    }

    #[instrument(skip(self), fields(subsystem = "suggestions", op = "reject"))]
    pub async fn reject_suggestion(&self, suggestion_id: Uuid) -> Result<SuggestionBatch> {
        self.transition(suggestion_id, SuggestionStatus::Rejected).await
    }

    /// Record that an approved item was applied by the host.
    pub async fn mark_applied(&self, suggestion_id: Uuid) -> Result<SuggestionBatch> {
        self.transition(suggestion_id, SuggestionStatus::Applied).await
    }

    async fn decide_all(&self, batch_id: Uuid, next: SuggestionStatus) -> Result<usize> {
        let (_, changed) = self
            .store
            .modify_batch(batch_id, |batch| {
                let mut changed = 0;
                for item in batch
                    .suggestions
                    .iter_mut()
                    .filter(|s| s.status == SuggestionStatus::Pending)
                {
                    item.transition(next)?;
                    changed += 1;
                }
                batch.recompute();
                Ok(changed)
            })
            .await?;
        info!(batch_id = %batch_id, changed, status = next.as_str(), "Bulk decision");
        self.archive_settled().await?;
        Ok(changed)
    }

    /// Approve every pending item of one batch. Returns how many changed.
    pub async fn approve_all(&self, batch_id: Uuid) -> Result<usize> {
        self.decide_all(batch_id, SuggestionStatus::Approved).await
    }

    /// Reject every pending item of one batch. Returns how many changed.
    pub async fn reject_all(&self, batch_id: Uuid) -> Result<usize> {
        self.decide_all(batch_id, SuggestionStatus::Rejected).await
    }

    /// Apply every approved item of a batch through the link applier.
    ///
    /// Per-item failures are collected in the report; the item stays
    /// `approved` so the caller can retry. Store failures propagate.
    #[instrument(skip(self), fields(subsystem = "suggestions", op = "apply_approved"))]
    pub async fn apply_approved(&self, batch_id: Uuid) -> Result<ApplyReport> {
        if !self.engine.config().enabled {
            debug!(batch_id = %batch_id, "Linking disabled, nothing applied");
            return Ok(ApplyReport::default());
        }
        let batch = self.store.get(batch_id).await?;
        let mut report = ApplyReport::default();

        for item in batch
            .suggestions
            .iter()
            .filter(|s| s.status == SuggestionStatus::Approved)
        {
            let Some(suggestion) = item.to_link_suggestion() else {
                report.failed += 1;
                report.errors.push(format!("{}: suggestion has no target", item.id));
                continue;
            };

            match self.engine.apply_suggestion(&suggestion).await {
                Ok(_) => {
                    self.store
                        .modify_by_suggestion(item.id, |batch| {
                            batch
                                .find_mut(item.id)
                                .ok_or(Error::SuggestionNotFound(item.id))?
                                .transition(SuggestionStatus::Applied)?;
                            batch.recompute();
                            Ok(())
                        })
                        .await?;
                    report.applied += 1;
                }
                Err(e) => {
                    warn!(suggestion_id = %item.id, error = %e, "Failed to apply suggestion");
                    report.failed += 1;
                    report.errors.push(format!(
                        "{} -> {}: {}",
                        suggestion.source_doc_id, suggestion.target_doc_id, e
                    ));
                }
            }
        }

        info!(
            batch_id = %batch_id,
            applied = report.applied,
            failed = report.failed,
            "Approved suggestions applied"
        );
        self.archive_settled().await?;
        Ok(report)
    }

    /// Move completed batches with only terminal items to the archive.
    pub async fn archive_settled(&self) -> Result<Vec<SuggestionBatch>> {
        let moved = self
            .store
            .archive_where(|b| b.is_completed() && b.is_settled())
            .await?;
        for batch in &moved {
            self.events.publish(LinkEvent::BatchCompleted {
                batch_id: batch.id,
                approved: batch.counts.approved,
                rejected: batch.counts.rejected,
                applied: batch.counts.applied,
            });
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tessera_core::{BatchStatus, DocumentStore, Evidence, LinkSuggestion, LinkType, LinkingConfig};
    use tessera_store::{JsonStore, MemoryDocumentStore};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LinkEvent>>);

    impl EventSink for Recorder {
        fn publish(&self, event: LinkEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn item(source: &str, target: &str, confidence: f32) -> SuggestionItem {
        LinkSuggestion::new(source, target, LinkType::EntityBased, confidence, Evidence::rule("shared-entity"))
            .into()
    }

    fn manager(dir: &tempfile::TempDir) -> (SuggestionManager, Arc<MemoryDocumentStore>, Arc<Recorder>) {
        manager_with(dir, LinkingConfig::default().with_bidirectional_links(false))
    }

    fn manager_with(
        dir: &tempfile::TempDir,
        linking: LinkingConfig,
    ) -> (SuggestionManager, Arc<MemoryDocumentStore>, Arc<Recorder>) {
        let docs = Arc::new(MemoryDocumentStore::with_documents([
            ("a.md", "# A\n"),
            ("b.md", "# B\n"),
            ("c.md", "# C\n"),
        ]));
        let engine = Arc::new(LinkingEngine::new(docs.clone(), linking));
        let store = BatchStore::new(Arc::new(JsonStore::new(dir.path())));
        let recorder = Arc::new(Recorder::default());
        let manager = SuggestionManager::new(store, engine, SuggestionConfig::default())
            .with_events(recorder.clone());
        (manager, docs, recorder)
    }

    #[tokio::test]
    async fn create_batch_auto_approves_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, recorder) = manager(&dir);

        let batch = manager
            .create_batch(
                BatchType::NoteAnalysis,
                "test",
                vec![item("a.md", "b.md", 0.92), item("a.md", "c.md", 0.7)],
            )
            .await
            .unwrap();
        assert_eq!(batch.suggestions[0].status, SuggestionStatus::Approved);
        assert_eq!(batch.suggestions[1].status, SuggestionStatus::Pending);
        assert_eq!(batch.batch_status, BatchStatus::PartiallyApproved);
        assert_eq!(batch.counts.approved, 1);

        let events = recorder.0.lock().unwrap();
        assert!(matches!(
            events[0],
            LinkEvent::BatchCreated { auto_approved: 1, suggestion_count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager(&dir);
        let err = manager
            .create_batch(BatchType::NoteAnalysis, "test", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_suggestion_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager(&dir);
        let err = manager.approve_suggestion(Uuid::now_v7()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn invalid_transition_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager(&dir);
        let batch = manager
            .create_batch(BatchType::NoteAnalysis, "test", vec![item("a.md", "b.md", 0.7), item("a.md", "c.md", 0.7)])
            .await
            .unwrap();
        let id = batch.suggestions[0].id;
        manager.reject_suggestion(id).await.unwrap();
        let err = manager.approve_suggestion(id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn apply_approved_writes_links_and_archives() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, docs, recorder) = manager(&dir);
        let batch = manager
            .create_batch(
                BatchType::NoteAnalysis,
                "test",
                vec![item("a.md", "b.md", 0.7), item("a.md", "c.md", 0.7)],
            )
            .await
            .unwrap();

        manager.approve_suggestion(batch.suggestions[0].id).await.unwrap();
        manager.reject_suggestion(batch.suggestions[1].id).await.unwrap();

        let report = manager.apply_approved(batch.id).await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed, 0);
        assert!(docs.read("a.md").await.unwrap().contains("[[b]]"));

        assert!(manager.pending_batches().await.unwrap().is_empty());
        let archived = manager.archived_batches().await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].counts.applied, 1);
        assert_eq!(archived[0].counts.rejected, 1);

        let events = recorder.0.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, LinkEvent::BatchCompleted { applied: 1, rejected: 1, .. })));
    }

    #[tokio::test]
    async fn apply_approved_is_noop_when_linking_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, docs, _) = manager_with(&dir, LinkingConfig::default().with_enabled(false));
        let batch = manager
            .create_batch(BatchType::NoteAnalysis, "test", vec![item("a.md", "b.md", 0.95)])
            .await
            .unwrap();
        assert_eq!(batch.suggestions[0].status, SuggestionStatus::Approved);

        let report = manager.apply_approved(batch.id).await.unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.failed, 0);
        assert!(!docs.read("a.md").await.unwrap().contains("[[b]]"));

        let batch = manager.get_batch(batch.id).await.unwrap();
        assert_eq!(batch.suggestions[0].status, SuggestionStatus::Approved);
        assert!(manager.archived_batches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_applied_requires_approval() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager(&dir);
        let batch = manager
            .create_batch(
                BatchType::NoteAnalysis,
                "test",
                vec![item("a.md", "b.md", 0.7), item("a.md", "c.md", 0.7)],
            )
            .await
            .unwrap();
        let (first, second) = (batch.suggestions[0].id, batch.suggestions[1].id);

        let err = manager.mark_applied(first).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: SuggestionStatus::Pending,
                to: SuggestionStatus::Applied
            }
        ));

        manager.approve_suggestion(first).await.unwrap();
        let batch = manager.mark_applied(first).await.unwrap();
        assert_eq!(batch.find(first).unwrap().status, SuggestionStatus::Applied);
        assert_eq!(batch.find(second).unwrap().status, SuggestionStatus::Pending);
        assert_eq!(batch.batch_status, BatchStatus::PartiallyApproved);
    }

    #[tokio::test]
    async fn apply_failure_is_reported_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager(&dir);
        let batch = manager
            .create_batch(
                BatchType::NoteAnalysis,
                "test",
                vec![item("a.md", "missing.md", 0.95), item("a.md", "b.md", 0.95)],
            )
            .await
            .unwrap();

        let report = manager.apply_approved(batch.id).await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("missing.md"));

        let batch = manager.get_batch(batch.id).await.unwrap();
        assert_eq!(batch.counts.approved, 1);
        assert_eq!(batch.batch_status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn reject_all_settles_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager(&dir);
        let batch = manager
            .create_batch(
                BatchType::NoteAnalysis,
                "test",
                vec![item("a.md", "b.md", 0.7), item("a.md", "c.md", 0.65)],
            )
            .await
            .unwrap();
        assert_eq!(manager.pending_suggestions().await.unwrap().len(), 2);

        assert_eq!(manager.reject_all(batch.id).await.unwrap(), 2);
        assert!(manager.pending_batches().await.unwrap().is_empty());
        assert_eq!(manager.archived_batches().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn placeholder_only_batch_archives_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager(&dir);
        manager
            .create_batch(
                BatchType::LlmEnrichment,
                "enrich",
                vec![SuggestionItem::enrichment_placeholder("a.md", "timeout")],
            )
            .await
            .unwrap();
        assert!(manager.pending_batches().await.unwrap().is_empty());
        assert_eq!(manager.archived_batches().await.unwrap().len(), 1);
    }
}
