//! One queue pass: claim, analyze, batch, enrich, record outcome.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use tessera_core::{BatchType, Document, Result, SuggestionItem, TextGenerator};
use tessera_inference::enrich_documents;
use tessera_linking::{LinkingEngine, SuggestionManager};

use crate::queue::EnhancementQueue;

/// Outcome of one `process_queue` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessReport {
    /// Items claimed in this pass.
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Links written by auto-apply across all processed documents.
    pub auto_applied: usize,
    /// Suggestion batches created in this pass.
    pub batches: Vec<Uuid>,
    /// Items marked `failed`, with the error recorded on each.
    pub failures: Vec<ItemFailure>,
    /// Non-fatal problems: auto-apply errors and enrichment failures.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub doc_ref: String,
    pub error: String,
}

/// Drains the enhancement queue through the linking engine.
///
/// Without a [`SuggestionManager`] the review tier of each analysis is only
/// reported, not persisted. Without a generator no enrichment runs, even when
/// the queue config asks for it.
pub struct QueueProcessor {
    queue: EnhancementQueue,
    engine: Arc<LinkingEngine>,
    suggestions: Option<Arc<SuggestionManager>>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl QueueProcessor {
    pub fn new(queue: EnhancementQueue, engine: Arc<LinkingEngine>) -> Self {
        Self {
            queue,
            engine,
            suggestions: None,
            generator: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Arc<SuggestionManager>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn queue(&self) -> &EnhancementQueue {
        &self.queue
    }

    /// Process up to `batch_size` queued documents.
    ///
    /// Indices are refreshed once before the pass. A failing document is
    /// marked `failed` with its error and never stops the others. Failed
    /// items are not retried; re-enqueue them to try again.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "processor", op = "process_queue"))]
    pub async fn process_queue(&self, batch_size: usize) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();
        if !self.queue.config().enabled {
            debug!("Queue disabled, skipping pass");
            return Ok(report);
        }

        let claimed = self.queue.claim(batch_size).await?;
        if claimed.is_empty() {
            return Ok(report);
        }
        let start = Instant::now();
        report.processed = claimed.len();

        if let Err(e) = self.engine.refresh_indices().await {
            warn!(error = %e, "Index refresh failed, analyzing with stale indices");
        }

        let mut enrich_targets = Vec::new();
        for item in &claimed {
            match self.process_item(&item.doc_ref, &mut report).await {
                Ok(()) => {
                    self.queue.finish(&item.doc_ref, None).await?;
                    report.completed += 1;
                    enrich_targets.push(item.doc_ref.clone());
                }
                Err(e) => {
                    warn!(doc_id = %item.doc_ref, error = %e, "Queue item failed");
                    self.queue
                        .finish(&item.doc_ref, Some(e.to_string()))
                        .await?;
                    report.failed += 1;
                    report.failures.push(ItemFailure {
                        doc_ref: item.doc_ref.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if self.queue.config().llm_enrichment && !enrich_targets.is_empty() {
            if let Err(e) = self.enrich(&enrich_targets, &mut report).await {
                warn!(error = %e, "Enrichment pass failed");
                report.errors.push(format!("enrichment: {}", e));
            }
        }

        info!(
            processed = report.processed,
            completed = report.completed,
            failed = report.failed,
            auto_applied = report.auto_applied,
            batches = report.batches.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Queue pass complete"
        );
        Ok(report)
    }

    async fn process_item(&self, doc_ref: &str, report: &mut ProcessReport) -> Result<()> {
        let result = self.engine.analyze_note(doc_ref).await?;
        report.auto_applied += result.auto_applied.len();
        report
            .errors
            .extend(result.errors.iter().map(|e| format!("{}: {}", doc_ref, e)));

        let Some(suggestions) = &self.suggestions else {
            return Ok(());
        };
        if result.review.is_empty() {
            return Ok(());
        }
        let items: Vec<SuggestionItem> = result
            .review
            .into_iter()
            .map(SuggestionItem::from)
            .collect();
        let batch = suggestions
            .create_batch(
                BatchType::EnhancementQueue,
                &format!("queue:{}", doc_ref),
                items,
            )
            .await?;
        report.batches.push(batch.id);
        Ok(())
    }

    /// One generator call per completed document, all results in one batch.
    async fn enrich(&self, doc_refs: &[String], report: &mut ProcessReport) -> Result<()> {
        let (Some(generator), Some(suggestions)) = (&self.generator, &self.suggestions) else {
            debug!("No generator or suggestion manager, skipping enrichment");
            return Ok(());
        };

        let store = self.engine.documents();
        let corpus = store.list().await?;
        let docs: Vec<Document> = corpus
            .iter()
            .filter(|d| doc_refs.contains(&d.id))
            .cloned()
            .collect();
        if docs.is_empty() {
            return Ok(());
        }

        let items = enrich_documents(generator.as_ref(), &docs, &corpus).await;
        let batch = suggestions
            .create_batch(BatchType::LlmEnrichment, "queue:enrichment", items)
            .await?;
        report.batches.push(batch.id);
        Ok(())
    }
}
