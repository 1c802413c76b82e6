//! Triage of deduplicated candidates into auto-apply, review, and reject tiers.

use serde::Serialize;
use tracing::debug;

use tessera_core::{LinkSuggestion, LinkingConfig};

/// Candidates split by tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Categorized {
    pub auto_apply: Vec<LinkSuggestion>,
    pub review: Vec<LinkSuggestion>,
    pub rejected: Vec<LinkSuggestion>,
}

/// Walk candidates in confidence order, enforcing the per-document cap.
///
/// Once `max_links_per_note` candidates are in the auto-apply tier, every
/// remaining candidate is rejected, including ones that would otherwise
/// qualify for review.
pub fn categorize(mut candidates: Vec<LinkSuggestion>, config: &LinkingConfig) -> Categorized {
    crate::dedup::sort_by_confidence(&mut candidates);

    let mut out = Categorized::default();
    let mut applied_count = 0usize;
    for candidate in candidates {
        if applied_count >= config.max_links_per_note {
            out.rejected.push(candidate);
        } else if candidate.confidence >= config.high_confidence_threshold {
            out.auto_apply.push(candidate);
            applied_count += 1;
        } else if candidate.confidence >= config.medium_confidence_threshold {
            out.review.push(candidate);
        } else {
            out.rejected.push(candidate);
        }
    }

    debug!(
        auto = out.auto_apply.len(),
        review = out.review.len(),
        rejected = out.rejected.len(),
        "Categorized candidates"
    );
    out
}
