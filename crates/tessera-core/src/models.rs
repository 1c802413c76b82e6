//! Domain models for tessera.
//!
//! Persisted types (batches, queue items) serialize with camelCase field names
//! so the JSON store schema stays stable for hosts that read it directly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::uuid_utils::new_v7;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Kind of an indexed document, read from the frontmatter `type` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    CalendarEvent,
    Transaction,
    ChatThread,
    ManualNote,
    NoteEnhancement,
    #[default]
    Other,
}

impl DocumentKind {
    /// Map a frontmatter `type` value to a kind. Unknown values become `Other`.
    pub fn from_type_field(value: &str) -> Self {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "event" | "calendar-event" | "calendar" | "meeting" => DocumentKind::CalendarEvent,
            "transaction" | "financial-transaction" => DocumentKind::Transaction,
            "chat" | "chat-thread" | "conversation" => DocumentKind::ChatThread,
            "manual" | "note" | "manual-note" => DocumentKind::ManualNote,
            "note-enhancement" | "enhancement" => DocumentKind::NoteEnhancement,
            _ => DocumentKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::CalendarEvent => "calendar-event",
            DocumentKind::Transaction => "transaction",
            DocumentKind::ChatThread => "chat-thread",
            DocumentKind::ManualNote => "manual-note",
            DocumentKind::NoteEnhancement => "note-enhancement",
            DocumentKind::Other => "other",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semi-structured document snapshot as seen by one analysis pass.
///
/// `id` is the vault-relative path (e.g. `Calendar/2024-01-20 Standup.md`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub kind: DocumentKind,
    pub title: String,
    #[serde(default)]
    pub frontmatter: BTreeMap<String, JsonValue>,
    pub content: String,
    pub cached_at: DateTime<Utc>,
}

impl Document {
    /// Name used inside wikilinks: the id without its `.md` extension.
    pub fn link_name(&self) -> &str {
        link_name_for(&self.id)
    }

    /// File stem of the document id.
    pub fn basename(&self) -> &str {
        let name = self.link_name();
        name.rsplit('/').next().unwrap_or(name)
    }

    /// Raw frontmatter value for `key`.
    pub fn field(&self, key: &str) -> Option<&JsonValue> {
        self.frontmatter.get(key)
    }

    /// First non-empty scalar among `keys`, rendered as a trimmed string.
    pub fn field_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.frontmatter.get(*key)? {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            JsonValue::Array(items) => items.iter().find_map(scalar_string),
            _ => None,
        })
    }

    /// First numeric value among `keys` (numbers or numeric strings).
    pub fn field_f64(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|key| match self.frontmatter.get(*key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().trim_start_matches('$').parse().ok(),
            _ => None,
        })
    }

    /// List value for `key`; a scalar string is split on commas.
    pub fn field_list(&self, key: &str) -> Vec<String> {
        match self.frontmatter.get(key) {
            Some(JsonValue::Array(items)) => items.iter().filter_map(scalar_string).collect(),
            Some(JsonValue::String(s)) => s
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
            Some(JsonValue::Number(n)) => vec![n.to_string()],
            _ => Vec::new(),
        }
    }
}

fn scalar_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strip a trailing `.md` from a document id.
pub fn link_name_for(id: &str) -> &str {
    id.strip_suffix(".md").unwrap_or(id)
}

// =============================================================================
// LINK SUGGESTIONS
// =============================================================================

/// Rule family that produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkType {
    TimeBased,
    EntityBased,
    LocationBased,
    CategoryBased,
    IdentifierBased,
    LlmSuggested,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::TimeBased => "time-based",
            LinkType::EntityBased => "entity-based",
            LinkType::LocationBased => "location-based",
            LinkType::CategoryBased => "category-based",
            LinkType::IdentifierBased => "identifier-based",
            LinkType::LlmSuggested => "llm-suggested",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule-specific evidence attached to a suggestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Rule name, e.g. `time-window`, `uid-match`, `shared-account`.
    pub rule: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_diff_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Evidence {
    pub fn rule(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            ..Default::default()
        }
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.matched_entities = entities;
        self
    }

    pub fn with_time_diff(mut self, minutes: f64) -> Self {
        self.time_diff_minutes = Some(minutes);
        self
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_common_tags(mut self, tags: Vec<String>) -> Self {
        self.common_tags = tags;
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid_match = Some(uid.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Presentation hints for a suggestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionMetadata {
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_text: Option<String>,
}

/// A proposed, not-yet-applied link between two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSuggestion {
    pub id: Uuid,
    pub source_doc_id: String,
    pub target_doc_id: String,
    pub link_type: LinkType,
    pub confidence: f32,
    pub evidence: Evidence,
    #[serde(default)]
    pub metadata: SuggestionMetadata,
    pub created_at: DateTime<Utc>,
}

impl LinkSuggestion {
    pub fn new(
        source_doc_id: impl Into<String>,
        target_doc_id: impl Into<String>,
        link_type: LinkType,
        confidence: f32,
        evidence: Evidence,
    ) -> Self {
        Self {
            id: new_v7(),
            source_doc_id: source_doc_id.into(),
            target_doc_id: target_doc_id.into(),
            link_type,
            confidence,
            evidence,
            metadata: SuggestionMetadata::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.metadata.bidirectional = bidirectional;
        self
    }

    pub fn with_link_text(mut self, text: impl Into<String>) -> Self {
        self.metadata.link_text = Some(text.into());
        self
    }

    /// Directed `source->target` key used by the applied-link record.
    pub fn forward_key(&self) -> String {
        link_key(&self.source_doc_id, &self.target_doc_id)
    }

    /// Directed `target->source` key.
    pub fn reverse_key(&self) -> String {
        link_key(&self.target_doc_id, &self.source_doc_id)
    }

    /// The same relationship seen from the target, with a fresh id.
    ///
    /// Custom link text names the original target, so it is not carried over.
    pub fn mirrored(&self) -> Self {
        Self {
            id: new_v7(),
            source_doc_id: self.target_doc_id.clone(),
            target_doc_id: self.source_doc_id.clone(),
            link_type: self.link_type,
            confidence: self.confidence,
            evidence: self.evidence.clone(),
            metadata: SuggestionMetadata {
                bidirectional: self.metadata.bidirectional,
                link_text: None,
            },
            created_at: Utc::now(),
        }
    }
}

/// Directed link key `source->target`.
pub fn link_key(source: &str, target: &str) -> String {
    format!("{}->{}", source, target)
}

/// Unordered pair key; `(a, b)` and `(b, a)` map to the same string.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        link_key(a, b)
    } else {
        link_key(b, a)
    }
}

/// One materialized link, kept for inspection of what the engine did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkHistoryEntry {
    pub source_doc_id: String,
    pub target_doc_id: String,
    pub link_type: LinkType,
    pub confidence: f32,
    pub applied_at: DateTime<Utc>,
}

// =============================================================================
// SUGGESTION BATCHES
// =============================================================================

/// Lifecycle status of one suggestion item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Applied,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Rejected => "rejected",
            SuggestionStatus::Applied => "applied",
        }
    }

    /// `pending -> approved -> applied`, or `pending -> rejected`.
    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        matches!(
            (self, next),
            (SuggestionStatus::Pending, SuggestionStatus::Approved)
                | (SuggestionStatus::Pending, SuggestionStatus::Rejected)
                | (SuggestionStatus::Approved, SuggestionStatus::Applied)
        )
    }

    /// No further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SuggestionStatus::Rejected | SuggestionStatus::Applied)
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a batch item came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionOrigin {
    #[default]
    Rule,
    Llm,
}

/// A suggestion held inside a batch. Rule-based and LLM-based items share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionItem {
    pub id: Uuid,
    #[serde(default)]
    pub origin: SuggestionOrigin,
    pub source_doc_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_doc_id: Option<String>,
    pub link_type: LinkType,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub metadata: SuggestionMetadata,
    #[serde(default)]
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuggestionItem {
    /// Degraded item standing in for a failed enrichment call.
    pub fn enrichment_placeholder(source_doc_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            id: new_v7(),
            origin: SuggestionOrigin::Llm,
            source_doc_id: source_doc_id.into(),
            target_doc_id: None,
            link_type: LinkType::LlmSuggested,
            confidence: 0.0,
            evidence: Evidence::rule("llm-enrichment").with_reasoning(error.clone()),
            metadata: SuggestionMetadata::default(),
            status: SuggestionStatus::Rejected,
            created_at: Utc::now(),
            updated_at: None,
            error: Some(error),
        }
    }

    /// Move to `next`, enforcing the lifecycle.
    pub fn transition(&mut self, next: SuggestionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Rebuild the applier's view of this item. Items without a target cannot be applied.
    pub fn to_link_suggestion(&self) -> Option<LinkSuggestion> {
        let target = self.target_doc_id.clone()?;
        Some(LinkSuggestion {
            id: self.id,
            source_doc_id: self.source_doc_id.clone(),
            target_doc_id: target,
            link_type: self.link_type,
            confidence: self.confidence,
            evidence: self.evidence.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        })
    }
}

impl From<LinkSuggestion> for SuggestionItem {
    fn from(s: LinkSuggestion) -> Self {
        let origin = if s.link_type == LinkType::LlmSuggested {
            SuggestionOrigin::Llm
        } else {
            SuggestionOrigin::Rule
        };
        Self {
            id: s.id,
            origin,
            source_doc_id: s.source_doc_id,
            target_doc_id: Some(s.target_doc_id),
            link_type: s.link_type,
            confidence: s.confidence,
            evidence: s.evidence,
            metadata: s.metadata,
            status: SuggestionStatus::Pending,
            created_at: s.created_at,
            updated_at: None,
            error: None,
        }
    }
}

/// Operation family that produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchType {
    NoteAnalysis,
    EnhancementQueue,
    CalendarImport,
    TransactionImport,
    LlmEnrichment,
}

impl BatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchType::NoteAnalysis => "note-analysis",
            BatchType::EnhancementQueue => "enhancement-queue",
            BatchType::CalendarImport => "calendar-import",
            BatchType::TransactionImport => "transaction-import",
            BatchType::LlmEnrichment => "llm-enrichment",
        }
    }
}

/// Rolled-up status of a batch, derived from its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStatus {
    #[default]
    Pending,
    PartiallyApproved,
    Completed,
}

/// Live counts of decided items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub approved: usize,
    pub rejected: usize,
    pub applied: usize,
}

/// A persisted group of suggestions tracked through the approval lifecycle.
///
/// `batch_status` and `counts` are derived from the items; call
/// [`SuggestionBatch::recompute`] after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionBatch {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub batch_type: BatchType,
    pub source_operation: String,
    pub timestamp: DateTime<Utc>,
    pub suggestions: Vec<SuggestionItem>,
    #[serde(default)]
    pub batch_status: BatchStatus,
    #[serde(default)]
    pub counts: BatchCounts,
}

impl SuggestionBatch {
    pub fn new(
        batch_type: BatchType,
        source_operation: impl Into<String>,
        suggestions: Vec<SuggestionItem>,
    ) -> Self {
        let mut batch = Self {
            id: new_v7(),
            batch_type,
            source_operation: source_operation.into(),
            timestamp: Utc::now(),
            suggestions,
            batch_status: BatchStatus::Pending,
            counts: BatchCounts::default(),
        };
        batch.recompute();
        batch
    }

    /// Status rollup as a pure function of item statuses.
    pub fn status_of(items: &[SuggestionItem]) -> BatchStatus {
        if items.iter().all(|s| s.status != SuggestionStatus::Pending) {
            BatchStatus::Completed
        } else if items.iter().any(|s| s.status != SuggestionStatus::Pending) {
            BatchStatus::PartiallyApproved
        } else {
            BatchStatus::Pending
        }
    }

    /// Recompute `batch_status` and `counts` from the items.
    pub fn recompute(&mut self) {
        let count = |status: SuggestionStatus| {
            self.suggestions
                .iter()
                .filter(|s| s.status == status)
                .count()
        };
        self.counts = BatchCounts {
            approved: count(SuggestionStatus::Approved),
            rejected: count(SuggestionStatus::Rejected),
            applied: count(SuggestionStatus::Applied),
        };
        self.batch_status = Self::status_of(&self.suggestions);
    }

    pub fn find(&self, suggestion_id: Uuid) -> Option<&SuggestionItem> {
        self.suggestions.iter().find(|s| s.id == suggestion_id)
    }

    pub fn find_mut(&mut self, suggestion_id: Uuid) -> Option<&mut SuggestionItem> {
        self.suggestions.iter_mut().find(|s| s.id == suggestion_id)
    }

    pub fn is_completed(&self) -> bool {
        self.batch_status == BatchStatus::Completed
    }

    /// Completed and nothing left waiting to be applied.
    pub fn is_settled(&self) -> bool {
        self.suggestions.iter().all(|s| s.status.is_terminal())
    }
}

// =============================================================================
// ENHANCEMENT QUEUE
// =============================================================================

/// Where a queued document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementSource {
    Calendar,
    Transaction,
    Manual,
    Chat,
}

impl EnhancementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementSource::Calendar => "calendar",
            EnhancementSource::Transaction => "transaction",
            EnhancementSource::Manual => "manual",
            EnhancementSource::Chat => "chat",
        }
    }
}

/// Processing priority for queued documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
    High,
    #[default]
    Medium,
    Low,
}

impl QueuePriority {
    /// Sort weight; higher is processed first.
    pub fn weight(&self) -> u8 {
        match self {
            QueuePriority::High => 3,
            QueuePriority::Medium => 2,
            QueuePriority::Low => 1,
        }
    }
}

/// Status of a queued document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

/// A document awaiting deferred relationship analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementQueueItem {
    pub doc_ref: String,
    pub source: EnhancementSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_data: Option<JsonValue>,
    #[serde(default)]
    pub priority: QueuePriority,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: QueueItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl EnhancementQueueItem {
    pub fn new(
        doc_ref: impl Into<String>,
        source: EnhancementSource,
        source_data: Option<JsonValue>,
        priority: QueuePriority,
    ) -> Self {
        Self {
            doc_ref: doc_ref.into(),
            source,
            source_data,
            priority,
            queued_at: Utc::now(),
            attempts: 0,
            last_attempt: None,
            status: QueueItemStatus::Queued,
            last_error: None,
        }
    }
}

/// Queue statistics summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl QueueStats {
    pub fn from_items(items: &[EnhancementQueueItem]) -> Self {
        let mut stats = Self {
            total: items.len(),
            ..Default::default()
        };
        for item in items {
            match item.status {
                QueueItemStatus::Queued => stats.queued += 1,
                QueueItemStatus::Processing => stats.processing += 1,
                QueueItemStatus::Completed => stats.completed += 1,
                QueueItemStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Partial result of applying many suggestions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Answer from the text-generation collaborator for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSuggestion {
    /// Id of the document the generator proposes to link to.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub link_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with(frontmatter: serde_json::Value) -> Document {
        let map = match frontmatter {
            JsonValue::Object(m) => m.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Document {
            id: "Finance/2024-01-20 Coffee.md".to_string(),
            kind: DocumentKind::Transaction,
            title: "Coffee".to_string(),
            frontmatter: map,
            content: String::new(),
            cached_at: Utc::now(),
        }
    }

    fn item(status: SuggestionStatus) -> SuggestionItem {
        let mut item: SuggestionItem = LinkSuggestion::new(
            "a.md",
            "b.md",
            LinkType::TimeBased,
            0.7,
            Evidence::rule("time-window"),
        )
        .into();
        item.status = status;
        item
    }

    #[test]
    fn document_kind_from_type_field() {
        assert_eq!(
            DocumentKind::from_type_field("calendar_event"),
            DocumentKind::CalendarEvent
        );
        assert_eq!(DocumentKind::from_type_field("Event"), DocumentKind::CalendarEvent);
        assert_eq!(
            DocumentKind::from_type_field("transaction"),
            DocumentKind::Transaction
        );
        assert_eq!(DocumentKind::from_type_field("chat"), DocumentKind::ChatThread);
        assert_eq!(DocumentKind::from_type_field("recipe"), DocumentKind::Other);
    }

    #[test]
    fn document_link_name_and_basename() {
        let doc = doc_with(json!({}));
        assert_eq!(doc.link_name(), "Finance/2024-01-20 Coffee");
        assert_eq!(doc.basename(), "2024-01-20 Coffee");
    }

    #[test]
    fn document_field_accessors() {
        let doc = doc_with(json!({
            "merchant_name": "  Blue Bottle ",
            "amount": 4.5,
            "category": ["Food and Drink", "Coffee Shop"],
            "tags": "coffee, morning",
            "total": "$12.00"
        }));
        assert_eq!(
            doc.field_str(&["merchant", "merchant_name"]).as_deref(),
            Some("Blue Bottle")
        );
        assert_eq!(doc.field_f64(&["amount"]), Some(4.5));
        assert_eq!(doc.field_f64(&["total"]), Some(12.0));
        assert_eq!(doc.field_list("category").len(), 2);
        assert_eq!(doc.field_list("tags"), vec!["coffee", "morning"]);
        assert_eq!(doc.field_str(&["category"]).as_deref(), Some("Food and Drink"));
        assert!(doc.field_str(&["missing"]).is_none());
    }

    #[test]
    fn link_keys() {
        assert_eq!(link_key("a", "b"), "a->b");
        assert_eq!(pair_key("b", "a"), pair_key("a", "b"));
        let s = LinkSuggestion::new("a", "b", LinkType::EntityBased, 0.8, Evidence::rule("x"));
        assert_eq!(s.forward_key(), "a->b");
        assert_eq!(s.reverse_key(), "b->a");
    }

    #[test]
    fn mirrored_swaps_endpoints_and_drops_link_text() {
        let s = LinkSuggestion::new("a", "b", LinkType::EntityBased, 0.8, Evidence::rule("x"))
            .with_bidirectional(true)
            .with_link_text("Bee");
        let m = s.mirrored();
        assert_eq!(m.source_doc_id, "b");
        assert_eq!(m.target_doc_id, "a");
        assert_ne!(m.id, s.id);
        assert!(m.metadata.bidirectional);
        assert!(m.metadata.link_text.is_none());
    }

    #[test]
    fn status_transitions() {
        use SuggestionStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Applied));
        assert!(!Pending.can_transition_to(Applied));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Applied.can_transition_to(Rejected));
    }

    #[test]
    fn item_transition_rejects_invalid() {
        let mut it = item(SuggestionStatus::Rejected);
        let err = it.transition(SuggestionStatus::Approved).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(it.status, SuggestionStatus::Rejected);
    }

    #[test]
    fn batch_status_rollup() {
        let mut batch = SuggestionBatch::new(
            BatchType::NoteAnalysis,
            "analyze:a.md",
            vec![item(SuggestionStatus::Pending), item(SuggestionStatus::Pending)],
        );
        assert_eq!(batch.batch_status, BatchStatus::Pending);

        batch.suggestions[0].status = SuggestionStatus::Approved;
        batch.recompute();
        assert_eq!(batch.batch_status, BatchStatus::PartiallyApproved);
        assert_eq!(batch.counts.approved, 1);

        batch.suggestions[1].status = SuggestionStatus::Rejected;
        batch.recompute();
        assert_eq!(batch.batch_status, BatchStatus::Completed);
        assert_eq!(
            batch.counts,
            BatchCounts {
                approved: 1,
                rejected: 1,
                applied: 0
            }
        );
        assert!(!batch.is_settled());

        batch.suggestions[0].status = SuggestionStatus::Applied;
        batch.recompute();
        assert!(batch.is_settled());
        assert_eq!(batch.counts.applied, 1);
        assert_eq!(batch.counts.approved, 0);
    }

    #[test]
    fn empty_batch_is_completed() {
        let batch = SuggestionBatch::new(BatchType::NoteAnalysis, "analyze", vec![]);
        assert_eq!(batch.batch_status, BatchStatus::Completed);
    }

    #[test]
    fn batch_serializes_camel_case() {
        let batch = SuggestionBatch::new(
            BatchType::EnhancementQueue,
            "queue:calendar",
            vec![item(SuggestionStatus::Pending)],
        );
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["type"], "enhancement-queue");
        assert_eq!(value["batchStatus"], "pending");
        assert_eq!(value["sourceOperation"], "queue:calendar");
        assert_eq!(value["suggestions"][0]["linkType"], "time-based");
        assert_eq!(value["suggestions"][0]["evidence"]["rule"], "time-window");
    }

    #[test]
    fn evidence_serializes_uid_match() {
        let evidence = Evidence::rule("uid-match").with_uid("evt-42");
        let value = serde_json::to_value(&evidence).unwrap();
        assert_eq!(value, json!({"rule": "uid-match", "uidMatch": "evt-42"}));
    }

    #[test]
    fn placeholder_is_rejected_and_zero_confidence() {
        let p = SuggestionItem::enrichment_placeholder("a.md", "timeout");
        assert_eq!(p.status, SuggestionStatus::Rejected);
        assert_eq!(p.confidence, 0.0);
        assert_eq!(p.link_type, LinkType::LlmSuggested);
        assert!(p.to_link_suggestion().is_none());
        assert_eq!(p.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn queue_priority_weights() {
        assert!(QueuePriority::High.weight() > QueuePriority::Medium.weight());
        assert!(QueuePriority::Medium.weight() > QueuePriority::Low.weight());
    }

    #[test]
    fn queue_stats_counts_by_status() {
        let mut a = EnhancementQueueItem::new("a.md", EnhancementSource::Manual, None, QueuePriority::Low);
        let b = EnhancementQueueItem::new("b.md", EnhancementSource::Chat, None, QueuePriority::High);
        a.status = QueueItemStatus::Failed;
        let stats = QueueStats::from_items(&[a, b]);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.total, 2);
    }
}
