//! Structured logging schema and field name constants for tessera.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Store failure surfaced to the caller |
//! | WARN  | Recoverable issue, per-item failure converted to a partial result |
//! | INFO  | Index refresh, batch creation, queue pass completions |
//! | DEBUG | Decision points, thresholds, tier counts |
//! | TRACE | Per-candidate iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "linking", "store", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "index", "matcher", "applier", "lifecycle", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "analyze_note", "refresh_indices", "store_batch", "process_queue"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document id (vault-relative path).
pub const DOC_ID: &str = "doc_id";

/// Suggestion batch UUID.
pub const BATCH_ID: &str = "batch_id";

/// Suggestion UUID.
pub const SUGGESTION_ID: &str = "suggestion_id";

/// Link type of a suggestion.
pub const LINK_TYPE: &str = "link_type";

/// Durable store logical path.
pub const STORE_PATH: &str = "store_path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of raw candidates produced by the matchers.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of documents indexed.
pub const DOCUMENT_COUNT: &str = "document_count";

/// Confidence value of a suggestion.
pub const CONFIDENCE: &str = "confidence";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_snake_case() {
        for name in [
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            DOC_ID,
            BATCH_ID,
            SUGGESTION_ID,
            LINK_TYPE,
            STORE_PATH,
            DURATION_MS,
            CANDIDATE_COUNT,
            DOCUMENT_COUNT,
            CONFIDENCE,
            SUCCESS,
            ERROR_MSG,
        ] {
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
