//! Pending and archived suggestion batch persistence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use tessera_core::defaults::{ARCHIVED_STORE_PATH, ARCHIVE_CAP, PENDING_STORE_PATH};
use tessera_core::{Error, Result, SuggestionBatch};

use crate::json_store::JsonStore;

/// On-disk shape of both the pending and the archived store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDocument {
    #[serde(default)]
    pub batches: Vec<SuggestionBatch>,
}

/// Durable store for suggestion batches.
///
/// Active batches live in `pending.json`; completed ones move to
/// `archived.json`, newest first, capped at `archive_cap`.
#[derive(Clone)]
pub struct BatchStore {
    store: Arc<JsonStore>,
    archive_cap: usize,
}

impl BatchStore {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self {
            store,
            archive_cap: ARCHIVE_CAP,
        }
    }

    pub fn with_archive_cap(mut self, cap: usize) -> Self {
        self.archive_cap = cap;
        self
    }

    /// All active batches, reloaded from disk.
    pub async fn load_pending(&self) -> Result<Vec<SuggestionBatch>> {
        let doc: BatchDocument = self.store.load(PENDING_STORE_PATH).await?;
        Ok(doc.batches)
    }

    /// Archived batches, newest first.
    pub async fn load_archived(&self) -> Result<Vec<SuggestionBatch>> {
        let doc: BatchDocument = self.store.load(ARCHIVED_STORE_PATH).await?;
        Ok(doc.batches)
    }

    pub async fn get(&self, batch_id: Uuid) -> Result<SuggestionBatch> {
        self.load_pending()
            .await?
            .into_iter()
            .find(|b| b.id == batch_id)
            .ok_or(Error::BatchNotFound(batch_id))
    }

    /// Persist a new batch.
    ///
    /// Merges into the current on-disk state: a batch whose id is already
    /// present is left untouched, so two passes finishing concurrently both
    /// land. Returns whether the batch was inserted.
    #[instrument(skip(self, batch), fields(batch_id = %batch.id))]
    pub async fn store_batch(&self, batch: &SuggestionBatch) -> Result<bool> {
        let inserted = self
            .store
            .update(PENDING_STORE_PATH, |doc: &mut BatchDocument| {
                if doc.batches.iter().any(|b| b.id == batch.id) {
                    return Ok(false);
                }
                doc.batches.push(batch.clone());
                Ok(true)
            })
            .await?;
        debug!(inserted, "store_batch");
        Ok(inserted)
    }

    /// Mutate the batch that holds `suggestion_id` under the store lock.
    ///
    /// The closure's changes are written only if it succeeds. Returns the
    /// updated batch alongside the closure's output.
    pub async fn modify_by_suggestion<F, R>(
        &self,
        suggestion_id: Uuid,
        f: F,
    ) -> Result<(SuggestionBatch, R)>
    where
        F: FnOnce(&mut SuggestionBatch) -> Result<R>,
    {
        self.store
            .update(PENDING_STORE_PATH, |doc: &mut BatchDocument| {
                let batch = doc
                    .batches
                    .iter_mut()
                    .find(|b| b.find(suggestion_id).is_some())
                    .ok_or(Error::SuggestionNotFound(suggestion_id))?;
                let out = f(batch)?;
                Ok((batch.clone(), out))
            })
            .await
    }

    /// Mutate one batch by id under the store lock.
    pub async fn modify_batch<F, R>(&self, batch_id: Uuid, f: F) -> Result<(SuggestionBatch, R)>
    where
        F: FnOnce(&mut SuggestionBatch) -> Result<R>,
    {
        self.store
            .update(PENDING_STORE_PATH, |doc: &mut BatchDocument| {
                let batch = doc
                    .batches
                    .iter_mut()
                    .find(|b| b.id == batch_id)
                    .ok_or(Error::BatchNotFound(batch_id))?;
                let out = f(batch)?;
                Ok((batch.clone(), out))
            })
            .await
    }

    /// Move every pending batch matching `predicate` into the archive.
    ///
    /// Returns the archived batches. The archive keeps the newest
    /// `archive_cap` entries.
    #[instrument(skip(self, predicate))]
    pub async fn archive_where<P>(&self, predicate: P) -> Result<Vec<SuggestionBatch>>
    where
        P: Fn(&SuggestionBatch) -> bool,
    {
        let moved = self
            .store
            .update(PENDING_STORE_PATH, |doc: &mut BatchDocument| {
                let (moved, kept): (Vec<_>, Vec<_>) =
                    doc.batches.drain(..).partition(|b| predicate(b));
                doc.batches = kept;
                Ok(moved)
            })
            .await?;

        if moved.is_empty() {
            return Ok(moved);
        }

        let cap = self.archive_cap;
        let incoming = moved.clone();
        self.store
            .update(ARCHIVED_STORE_PATH, move |doc: &mut BatchDocument| {
                for batch in incoming {
                    doc.batches.retain(|b| b.id != batch.id);
                    doc.batches.insert(0, batch);
                }
                doc.batches.truncate(cap);
                Ok(())
            })
            .await?;

        info!(count = moved.len(), "Archived settled batches");
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{
        BatchType, Evidence, LinkSuggestion, LinkType, SuggestionItem, SuggestionStatus,
    };

    fn batch(status: SuggestionStatus) -> SuggestionBatch {
        let mut item: SuggestionItem =
            LinkSuggestion::new("a.md", "b.md", LinkType::EntityBased, 0.7, Evidence::rule("x"))
                .into();
        item.status = status;
        SuggestionBatch::new(BatchType::NoteAnalysis, "analyze:a.md", vec![item])
    }

    fn store(dir: &tempfile::TempDir) -> BatchStore {
        BatchStore::new(Arc::new(JsonStore::new(dir.path())))
    }

    #[tokio::test]
    async fn store_batch_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let b = batch(SuggestionStatus::Pending);
        assert!(store.store_batch(&b).await.unwrap());
        assert!(!store.store_batch(&b).await.unwrap());
        assert_eq!(store.load_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn modify_by_suggestion_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.store_batch(&batch(SuggestionStatus::Pending)).await.unwrap();
        let err = store
            .modify_by_suggestion(Uuid::nil(), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn modify_by_suggestion_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let b = batch(SuggestionStatus::Pending);
        let sid = b.suggestions[0].id;
        store.store_batch(&b).await.unwrap();

        let (updated, _) = store
            .modify_by_suggestion(sid, |batch| {
                batch
                    .find_mut(sid)
                    .unwrap()
                    .transition(SuggestionStatus::Approved)?;
                batch.recompute();
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.counts.approved, 1);

        let reloaded = store.get(b.id).await.unwrap();
        assert_eq!(reloaded.suggestions[0].status, SuggestionStatus::Approved);
    }

    #[tokio::test]
    async fn archive_moves_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).with_archive_cap(2);
        for _ in 0..3 {
            store
                .store_batch(&batch(SuggestionStatus::Rejected))
                .await
                .unwrap();
        }
        let keep = batch(SuggestionStatus::Pending);
        store.store_batch(&keep).await.unwrap();

        let moved = store.archive_where(|b| b.is_settled()).await.unwrap();
        assert_eq!(moved.len(), 3);

        let pending = store.load_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, keep.id);

        let archived = store.load_archived().await.unwrap();
        assert_eq!(archived.len(), 2);
        assert_eq!(archived[0].id, moved[2].id);
    }
}
