//! Centralized default constants for tessera.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs, matchers, and the queue reference these constants instead
//! of defining their own magic numbers.

// =============================================================================
// CONFIDENCE
// =============================================================================

/// Hard ceiling for every rule-based confidence value.
pub const MAX_RULE_CONFIDENCE: f32 = 0.95;

/// Confidence assigned to exact identifier matches.
pub const IDENTIFIER_CONFIDENCE: f32 = 0.95;

/// Candidates at or above this confidence are auto-applied by the categorizer.
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.85;

/// Candidates at or above this confidence are queued for review.
pub const MEDIUM_CONFIDENCE_THRESHOLD: f32 = 0.60;

/// Entity matches below this confidence are discarded.
pub const FUZZY_MATCH_THRESHOLD: f32 = 0.70;

/// Items at or above this confidence are approved when a batch is created.
pub const AUTO_APPROVE_THRESHOLD: f32 = 0.90;

/// Maximum auto-applied links per document per analysis pass.
pub const MAX_LINKS_PER_NOTE: usize = 5;

// =============================================================================
// TIME WINDOWS (minutes)
// =============================================================================

/// Base time window for document kinds without a specific window.
pub const BASE_TIME_WINDOW_MINUTES: i64 = 60;

/// Calendar events.
pub const EVENT_WINDOW_MINUTES: i64 = 240;

/// Calendar events whose meeting type is `meeting` or `conference`.
pub const MEETING_WINDOW_MINUTES: i64 = 480;

/// Transactions.
pub const TRANSACTION_WINDOW_MINUTES: i64 = 720;

/// Transactions above [`LARGE_TRANSACTION_AMOUNT`].
pub const LARGE_TRANSACTION_WINDOW_MINUTES: i64 = 1440;

/// Transactions in a travel, hotel, or transport category.
pub const TRAVEL_TRANSACTION_WINDOW_MINUTES: i64 = 2880;

/// Chat threads.
pub const CHAT_WINDOW_MINUTES: i64 = 120;

/// Note enhancements.
pub const NOTE_ENHANCEMENT_WINDOW_MINUTES: i64 = 1440;

/// Amount above which a transaction gets the wider window.
pub const LARGE_TRANSACTION_AMOUNT: f64 = 500.0;

// =============================================================================
// LOCATION
// =============================================================================

/// Default radius for location matches (same abstract unit as the distance tiers).
pub const LOCATION_RADIUS: f64 = 100.0;

/// Distance assigned when one location string contains the other.
pub const LOCATION_NEAR_DISTANCE: f64 = 50.0;

/// Distance assigned to unrelated locations.
pub const LOCATION_FAR_DISTANCE: f64 = 1000.0;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Frontmatter fields compared by the identifier matcher.
pub const IDENTIFIER_FIELDS: &[&str] = &["ical_uid", "transaction_id", "event_id"];

// =============================================================================
// SUGGESTION STORE
// =============================================================================

/// Number of archived batches kept (most recent first).
pub const ARCHIVE_CAP: usize = 50;

/// Logical path of the active batch store.
pub const PENDING_STORE_PATH: &str = "pending.json";

/// Logical path of the archived batch store.
pub const ARCHIVED_STORE_PATH: &str = "archived.json";

/// Logical path of the enhancement queue store.
pub const QUEUE_STORE_PATH: &str = "queue.json";

// =============================================================================
// QUEUE PROCESSING
// =============================================================================

/// Default number of queue items processed per `process_queue` call.
pub const QUEUE_BATCH_SIZE: usize = 5;

/// Default queue worker poll interval in milliseconds.
pub const QUEUE_POLL_INTERVAL_MS: u64 = 30_000;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Maximum characters of document content included in an enrichment prompt.
pub const PROMPT_CONTENT_CHARS: usize = 2000;

// =============================================================================
// APPLIER
// =============================================================================

/// Heading of the section link lines are appended to.
pub const RELATED_SECTION_HEADING: &str = "## Related";
