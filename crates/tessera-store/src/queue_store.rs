//! Enhancement queue persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_core::defaults::QUEUE_STORE_PATH;
use tessera_core::{EnhancementQueueItem, Result};

use crate::json_store::JsonStore;

/// On-disk shape of `queue.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDocument {
    #[serde(default)]
    pub queue: Vec<EnhancementQueueItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Durable store for enhancement queue items.
#[derive(Clone)]
pub struct QueueStore {
    store: Arc<JsonStore>,
}

impl QueueStore {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    /// Current queue contents in stored order.
    pub async fn load(&self) -> Result<Vec<EnhancementQueueItem>> {
        let doc: QueueDocument = self.store.load(QUEUE_STORE_PATH).await?;
        Ok(doc.queue)
    }

    /// Read-modify-write the queue under its path lock; stamps `lastUpdated`.
    pub async fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<EnhancementQueueItem>) -> Result<R>,
    {
        self.store
            .update(QUEUE_STORE_PATH, |doc: &mut QueueDocument| {
                let out = f(&mut doc.queue)?;
                doc.last_updated = Some(Utc::now());
                Ok(out)
            })
            .await
    }
}
