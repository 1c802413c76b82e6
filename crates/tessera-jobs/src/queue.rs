//! Enhancement queue: deferred relationship analysis for new documents.
//!
//! Two-phase creation writes a minimal document immediately and queues it;
//! the expensive analysis runs later through [`crate::QueueProcessor`].

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use tessera_core::{
    DocumentStore, EnhancementQueueItem, EnhancementSource, QueueConfig, QueueItemStatus,
    QueuePriority, QueueStats, Result,
};
use tessera_store::QueueStore;

/// Durable queue of documents awaiting analysis.
#[derive(Clone)]
pub struct EnhancementQueue {
    store: QueueStore,
    config: QueueConfig,
}

impl EnhancementQueue {
    pub fn new(store: QueueStore, config: QueueConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Queue `doc_ref`, replacing any existing entry for the same path.
    ///
    /// The replacement is a fresh entry at the back of the queue with its
    /// attempt count reset. Returns `None` when the queue is disabled.
    #[instrument(skip(self, source_data), fields(subsystem = "queue", op = "enqueue"))]
    pub async fn enqueue(
        &self,
        doc_ref: &str,
        source: EnhancementSource,
        source_data: Option<JsonValue>,
        priority: QueuePriority,
    ) -> Result<Option<EnhancementQueueItem>> {
        if !self.config.enabled {
            debug!("Queue disabled, not enqueuing");
            return Ok(None);
        }

        let item = EnhancementQueueItem::new(doc_ref, source, source_data, priority);
        let replaced = self
            .store
            .update(|queue| {
                let before = queue.len();
                queue.retain(|i| i.doc_ref != item.doc_ref);
                queue.push(item.clone());
                Ok(queue.len() == before)
            })
            .await?;

        info!(
            doc_id = doc_ref,
            source = source.as_str(),
            ?priority,
            replaced,
            "Document queued"
        );
        Ok(Some(item))
    }

    /// Two-phase creation: write `minimal_content` at `path`, then queue it.
    pub async fn create_and_enqueue(
        &self,
        docs: &dyn DocumentStore,
        path: &str,
        minimal_content: &str,
        source: EnhancementSource,
        source_data: Option<JsonValue>,
        priority: QueuePriority,
    ) -> Result<Option<EnhancementQueueItem>> {
        docs.write(path, minimal_content).await?;
        self.enqueue(path, source, source_data, priority).await
    }

    /// Queue contents in stored order.
    pub async fn items(&self) -> Result<Vec<EnhancementQueueItem>> {
        self.store.load().await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats::from_items(&self.store.load().await?))
    }

    /// Drop completed and failed items. Returns how many were removed.
    pub async fn cleanup(&self) -> Result<usize> {
        let removed = self
            .store
            .update(|queue| {
                let before = queue.len();
                queue.retain(|i| {
                    !matches!(i.status, QueueItemStatus::Completed | QueueItemStatus::Failed)
                });
                Ok(before - queue.len())
            })
            .await?;
        info!(removed, "Queue cleaned up");
        Ok(removed)
    }

    /// Remove one entry. Returns whether it was present.
    pub async fn remove(&self, doc_ref: &str) -> Result<bool> {
        self.store
            .update(|queue| {
                let before = queue.len();
                queue.retain(|i| i.doc_ref != doc_ref);
                Ok(queue.len() != before)
            })
            .await
    }

    /// Move up to `batch_size` queued items to `processing`.
    ///
    /// Items are taken by priority weight, highest first; equal weights keep
    /// their queue order. Each claimed item gets one more attempt recorded.
    pub(crate) async fn claim(&self, batch_size: usize) -> Result<Vec<EnhancementQueueItem>> {
        self.store
            .update(|queue| {
                let mut candidates: Vec<usize> = queue
                    .iter()
                    .enumerate()
                    .filter(|(_, i)| i.status == QueueItemStatus::Queued)
                    .map(|(idx, _)| idx)
                    .collect();
                candidates.sort_by_key(|&idx| std::cmp::Reverse(queue[idx].priority.weight()));
                candidates.truncate(batch_size);

                let now = Utc::now();
                Ok(candidates
                    .into_iter()
                    .map(|idx| {
                        let item = &mut queue[idx];
                        item.status = QueueItemStatus::Processing;
                        item.attempts += 1;
                        item.last_attempt = Some(now);
                        item.clone()
                    })
                    .collect())
            })
            .await
    }

    /// Record the outcome of one processed item.
    pub(crate) async fn finish(&self, doc_ref: &str, error: Option<String>) -> Result<()> {
        self.store
            .update(|queue| {
                if let Some(item) = queue
                    .iter_mut()
                    .find(|i| i.doc_ref == doc_ref && i.status == QueueItemStatus::Processing)
                {
                    item.status = if error.is_some() {
                        QueueItemStatus::Failed
                    } else {
                        QueueItemStatus::Completed
                    };
                    item.last_error = error;
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_store::{JsonStore, MemoryDocumentStore};

    fn queue(dir: &tempfile::TempDir) -> EnhancementQueue {
        EnhancementQueue::new(
            QueueStore::new(Arc::new(JsonStore::new(dir.path()))),
            QueueConfig::default(),
        )
    }

    #[tokio::test]
    async fn requeue_replaces_entry() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        q.enqueue("a.md", EnhancementSource::Manual, None, QueuePriority::Low)
            .await
            .unwrap();
        q.enqueue("b.md", EnhancementSource::Chat, None, QueuePriority::Medium)
            .await
            .unwrap();
        q.enqueue("a.md", EnhancementSource::Manual, None, QueuePriority::High)
            .await
            .unwrap();

        let items = q.items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].doc_ref, "a.md");
        assert_eq!(items[1].priority, QueuePriority::High);
    }

    #[tokio::test]
    async fn claim_orders_by_priority_stably() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        for (doc, priority) in [
            ("low.md", QueuePriority::Low),
            ("med1.md", QueuePriority::Medium),
            ("high.md", QueuePriority::High),
            ("med2.md", QueuePriority::Medium),
        ] {
            q.enqueue(doc, EnhancementSource::Manual, None, priority)
                .await
                .unwrap();
        }

        let claimed = q.claim(3).await.unwrap();
        let order: Vec<_> = claimed.iter().map(|i| i.doc_ref.as_str()).collect();
        assert_eq!(order, vec!["high.md", "med1.md", "med2.md"]);
        assert!(claimed.iter().all(|i| i.attempts == 1 && i.last_attempt.is_some()));

        let stats = q.stats().await.unwrap();
        assert_eq!(stats.processing, 3);
        assert_eq!(stats.queued, 1);
    }

    #[tokio::test]
    async fn finish_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        for doc in ["a.md", "b.md", "c.md"] {
            q.enqueue(doc, EnhancementSource::Calendar, None, QueuePriority::Medium)
                .await
                .unwrap();
        }
        q.claim(2).await.unwrap();
        q.finish("a.md", None).await.unwrap();
        q.finish("b.md", Some("boom".into())).await.unwrap();

        let items = q.items().await.unwrap();
        assert_eq!(items[0].status, QueueItemStatus::Completed);
        assert_eq!(items[1].status, QueueItemStatus::Failed);
        assert_eq!(items[1].last_error.as_deref(), Some("boom"));

        assert_eq!(q.cleanup().await.unwrap(), 2);
        assert_eq!(q.items().await.unwrap().len(), 1);
        assert!(q.remove("c.md").await.unwrap());
        assert!(!q.remove("c.md").await.unwrap());
    }

    #[tokio::test]
    async fn create_and_enqueue_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        let docs = MemoryDocumentStore::new();
        q.create_and_enqueue(
            &docs,
            "Calendar/standup.md",
            "---\ntype: event\n---\n# Standup\n",
            EnhancementSource::Calendar,
            Some(serde_json::json!({"id": "evt-1"})),
            QueuePriority::High,
        )
        .await
        .unwrap();
        assert!(docs.exists("Calendar/standup.md").await.unwrap());
        assert_eq!(q.items().await.unwrap()[0].source_data.as_ref().unwrap()["id"], "evt-1");
    }

    #[tokio::test]
    async fn disabled_queue_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let q = EnhancementQueue::new(
            QueueStore::new(Arc::new(JsonStore::new(dir.path()))),
            QueueConfig::default().with_enabled(false),
        );
        let queued = q
            .enqueue("a.md", EnhancementSource::Manual, None, QueuePriority::Low)
            .await
            .unwrap();
        assert!(queued.is_none());
        assert!(q.items().await.unwrap().is_empty());
    }
}
