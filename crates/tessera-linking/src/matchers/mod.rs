//! Rule matchers.
//!
//! Each matcher looks at one source document against the index and returns
//! raw candidates with evidence. Confidences are per-rule heuristics and are
//! not normalized across rules; every rule-based value is clamped to
//! `[0, MAX_RULE_CONFIDENCE]`.

mod category;
mod entity;
mod identifier;
mod location;
mod time;
mod typed;

use std::collections::BTreeSet;

use tessera_core::defaults::MAX_RULE_CONFIDENCE;
use tessera_core::{Document, LinkingConfig, LinkSuggestion};

use crate::entities::TypedEntity;
use crate::index::IndexState;

pub use category::CategoryMatcher;
pub use entity::EntityMatcher;
pub use identifier::IdentifierMatcher;
pub use location::{extract_location, location_distance, LocationMatcher};
pub use time::{document_timestamp, explicit_start_time, time_window_minutes, TimeMatcher};
pub use typed::{MeetingSeriesMatcher, SharedAccountMatcher, SharedAttendeeMatcher};

/// Everything a matcher may look at for one source document.
pub struct MatchContext<'a> {
    pub source: &'a Document,
    pub entities: &'a [TypedEntity],
    pub tags: &'a BTreeSet<String>,
    pub index: &'a IndexState,
    pub config: &'a LinkingConfig,
}

impl<'a> MatchContext<'a> {
    /// Cached documents other than the source.
    pub fn others(&self) -> impl Iterator<Item = &'a Document> + 'a {
        let source_id = self.source.id.as_str();
        self.index.documents().filter(move |d| d.id != source_id)
    }

    /// New suggestion from the source, carrying the configured bidirectional flag.
    pub fn suggest(
        &self,
        target: &Document,
        link_type: tessera_core::LinkType,
        confidence: f64,
        evidence: tessera_core::Evidence,
    ) -> LinkSuggestion {
        LinkSuggestion::new(
            self.source.id.clone(),
            target.id.clone(),
            link_type,
            finalize_confidence(confidence),
            evidence,
        )
        .with_bidirectional(self.config.bidirectional_links)
    }
}

/// One rule family.
pub trait Matcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion>;
}

/// Clamp to `[0, MAX_RULE_CONFIDENCE]` and round to three decimals so that
/// additive adjustments land on the values they were designed for.
pub fn finalize_confidence(value: f64) -> f32 {
    let clamped = value.clamp(0.0, MAX_RULE_CONFIDENCE as f64);
    ((clamped * 1000.0).round() / 1000.0) as f32
}

/// The built-in matcher set, in evaluation order.
pub fn default_matchers() -> Vec<Box<dyn Matcher>> {
    vec![
        Box::new(TimeMatcher),
        Box::new(EntityMatcher),
        Box::new(LocationMatcher),
        Box::new(CategoryMatcher),
        Box::new(IdentifierMatcher),
        Box::new(SharedAccountMatcher),
        Box::new(SharedAttendeeMatcher),
        Box::new(MeetingSeriesMatcher),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_clamps_and_rounds() {
        assert_eq!(finalize_confidence(1.2), 0.95);
        assert_eq!(finalize_confidence(-0.3), 0.0);
        assert_eq!(finalize_confidence(0.70 - 0.10), 0.6);
        assert_eq!(finalize_confidence(0.5 + 2.0 / 3.0 * 0.3), 0.7);
    }

    #[test]
    fn default_matcher_names() {
        let names: Vec<_> = default_matchers().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec![
                "time",
                "entity",
                "location",
                "category",
                "identifier",
                "shared-account",
                "shared-attendee",
                "meeting-series"
            ]
        );
    }
}
