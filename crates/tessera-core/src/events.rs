//! Domain events, envelope schema, and the event sink hosts subscribe to.
//!
//! The engine never renders notifications itself. It publishes [`LinkEvent`]s
//! through an [`EventSink`]; the host decides how to surface them (status bar,
//! toast, log line). [`EventBus`] is the broadcast implementation used by the
//! worker and the command-line harness, [`NoOpSink`] discards everything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// Link Events (domain payloads)
// ============================================================================

/// Events published by the linking engine and the batch lifecycle manager.
///
/// Serialized as JSON with a `type` tag, e.g.
/// `{"type":"BatchCreated","batch_id":"...","suggestion_count":3,"auto_approved":1}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum LinkEvent {
    /// Links were written into a document's content.
    LinksApplied { source_doc_id: String, count: usize },
    /// A suggestion batch was persisted.
    BatchCreated {
        batch_id: Uuid,
        suggestion_count: usize,
        auto_approved: usize,
    },
    /// A batch reached `completed` and was moved to the archive.
    BatchCompleted {
        batch_id: Uuid,
        approved: usize,
        rejected: usize,
        applied: usize,
    },
}

impl LinkEvent {
    /// Short event name, used for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            LinkEvent::LinksApplied { .. } => "LinksApplied",
            LinkEvent::BatchCreated { .. } => "BatchCreated",
            LinkEvent::BatchCompleted { .. } => "BatchCompleted",
        }
    }

    /// Namespaced event type for the envelope (e.g. `"batch.created"`).
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            LinkEvent::LinksApplied { .. } => "links.applied",
            LinkEvent::BatchCreated { .. } => "batch.created",
            LinkEvent::BatchCompleted { .. } => "batch.completed",
        }
    }

    /// Entity type this event relates to.
    pub fn entity_type(&self) -> &'static str {
        match self {
            LinkEvent::LinksApplied { .. } => "document",
            LinkEvent::BatchCreated { .. } | LinkEvent::BatchCompleted { .. } => "batch",
        }
    }

    /// Primary entity id (document path or batch UUID).
    pub fn entity_id(&self) -> String {
        match self {
            LinkEvent::LinksApplied { source_doc_id, .. } => source_doc_id.clone(),
            LinkEvent::BatchCreated { batch_id, .. }
            | LinkEvent::BatchCompleted { batch_id, .. } => batch_id.to_string(),
        }
    }

    /// One-line human readable summary for hosts that only show text.
    pub fn summary(&self) -> String {
        match self {
            LinkEvent::LinksApplied {
                source_doc_id,
                count,
            } => format!("Applied {} link(s) to {}", count, source_doc_id),
            LinkEvent::BatchCreated {
                suggestion_count,
                auto_approved,
                ..
            } => format!(
                "Created batch with {} suggestion(s), {} auto-approved",
                suggestion_count, auto_approved
            ),
            LinkEvent::BatchCompleted {
                approved,
                rejected,
                applied,
                ..
            } => format!(
                "Batch completed: {} applied, {} approved, {} rejected",
                applied, approved, rejected
            ),
        }
    }
}

// ============================================================================
// Event Envelope
// ============================================================================

/// Versioned wrapper around a [`LinkEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g. `"links.applied"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Type of entity this event relates to.
    pub entity_type: String,
    /// Id of the entity this event relates to.
    pub entity_id: String,
    /// Payload schema version.
    pub payload_version: u32,
    /// Domain event data.
    pub payload: LinkEvent,
}

impl EventEnvelope {
    pub fn new(event: LinkEvent) -> Self {
        Self {
            event_id: crate::uuid_utils::new_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            entity_type: event.entity_type().to_string(),
            entity_id: event.entity_id(),
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Receiver of domain events. Publishing never fails and never blocks.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LinkEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn publish(&self, _event: LinkEvent) {}
}

/// Broadcast-based event bus for distributing events to multiple consumers.
///
/// Slow receivers that fall behind get a `Lagged` error and miss events.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Wrap the event in an envelope and send it to all subscribers.
    /// Without subscribers the event is dropped.
    pub fn emit(&self, event: LinkEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: LinkEvent) {
        self.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        bus.publish(LinkEvent::LinksApplied {
            source_doc_id: "a.md".to_string(),
            count: 2,
        });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "links.applied");
        assert_eq!(envelope.entity_type, "document");
        assert_eq!(envelope.entity_id, "a.md");
        assert_eq!(envelope.payload_version, 1);
        assert!(matches!(
            envelope.payload,
            LinkEvent::LinksApplied { count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let batch_id = Uuid::nil();

        bus.emit(LinkEvent::BatchCreated {
            batch_id,
            suggestion_count: 3,
            auto_approved: 1,
        });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.event_type, "batch.created");
        assert_eq!(e2.entity_id, batch_id.to_string());
    }

    #[test]
    fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(4);
        bus.emit(LinkEvent::BatchCompleted {
            batch_id: Uuid::nil(),
            approved: 0,
            rejected: 1,
            applied: 2,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LinkEvent::LinksApplied {
            source_doc_id: "a.md".to_string(),
            count: 1,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "LinksApplied");
        assert_eq!(value["count"], 1);
        assert_eq!(event.event_type(), "LinksApplied");
    }

    #[test]
    fn test_summary_text() {
        let event = LinkEvent::BatchCompleted {
            batch_id: Uuid::nil(),
            approved: 1,
            rejected: 2,
            applied: 3,
        };
        assert_eq!(
            event.summary(),
            "Batch completed: 3 applied, 1 approved, 2 rejected"
        );
    }
}
