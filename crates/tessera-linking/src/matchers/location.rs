//! Location matcher.
//!
//! Distance is a three-tier abstraction over location strings, not a real
//! geodistance: identical is 0, containment is "near", anything else "far".

use once_cell::sync::Lazy;
use regex::Regex;

use tessera_core::defaults::{LOCATION_FAR_DISTANCE, LOCATION_NEAR_DISTANCE};
use tessera_core::{Document, Evidence, LinkSuggestion, LinkType};

use super::{MatchContext, Matcher};

static AT_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\bat\b|@)\s+([^,\n.;]+)").expect("location regex"));

/// Location of a document: frontmatter `location`, else the first
/// `at <place>` / `@ <place>` phrase in the body. Lowercased and trimmed.
pub fn extract_location(doc: &Document) -> Option<String> {
    let raw = doc.field_str(&["location"]).or_else(|| {
        AT_LOCATION
            .captures(&doc.content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })?;
    let location = raw.trim().to_lowercase();
    (!location.is_empty()).then_some(location)
}

/// Tiered distance between two normalized location strings.
pub fn location_distance(a: &str, b: &str) -> f64 {
    if a == b {
        0.0
    } else if a.contains(b) || b.contains(a) {
        LOCATION_NEAR_DISTANCE
    } else {
        LOCATION_FAR_DISTANCE
    }
}

pub struct LocationMatcher;

impl Matcher for LocationMatcher {
    fn name(&self) -> &'static str {
        "location"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        let Some(source_location) = extract_location(ctx.source) else {
            return Vec::new();
        };
        let radius = ctx.config.location_radius;

        ctx.others()
            .filter_map(|target| {
                let target_location = extract_location(target)?;
                let distance = location_distance(&source_location, &target_location);
                if distance > radius {
                    return None;
                }
                let confidence = (1.0 - distance / radius).max(0.6);
                Some(ctx.suggest(
                    target,
                    LinkType::LocationBased,
                    confidence,
                    Evidence::rule("location-match")
                        .with_entities(vec![target_location])
                        .with_distance(distance),
                ))
            })
            .collect()
    }
}
