//! Duplicate and conflict resolution for one source document's candidates.

use std::collections::HashSet;

use tracing::trace;

use tessera_core::{pair_key, LinkSuggestion};

/// Sort candidates by confidence, highest first. Ties keep input order.
pub fn sort_by_confidence(candidates: &mut [LinkSuggestion]) {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

/// Drop repeated pairs, already-applied links, and reverse duplicates.
///
/// A candidate survives only if its unordered pair was not seen earlier in
/// this pass, its forward `source->target` key is not applied, and its
/// reverse key is not applied either. The first (highest confidence)
/// occurrence of a pair wins.
pub fn dedup(mut candidates: Vec<LinkSuggestion>, applied: &HashSet<String>) -> Vec<LinkSuggestion> {
    sort_by_confidence(&mut candidates);

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            if c.source_doc_id == c.target_doc_id {
                return false;
            }
            if !seen.insert(pair_key(&c.source_doc_id, &c.target_doc_id)) {
                trace!(target = %c.target_doc_id, "dropping repeated pair");
                return false;
            }
            if applied.contains(&c.forward_key()) || applied.contains(&c.reverse_key()) {
                trace!(target = %c.target_doc_id, "dropping applied pair");
                return false;
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{link_key, Evidence, LinkType};

    fn s(source: &str, target: &str, confidence: f32) -> LinkSuggestion {
        LinkSuggestion::new(source, target, LinkType::EntityBased, confidence, Evidence::rule("x"))
            .with_bidirectional(true)
    }

    #[test]
    fn keeps_highest_of_repeated_pair() {
        let out = dedup(
            vec![s("a", "b", 0.7), s("a", "b", 0.9), s("b", "a", 0.8)],
            &HashSet::new(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn drops_forward_and_reverse_applied() {
        let applied: HashSet<String> = [link_key("b", "a")].into_iter().collect();
        let out = dedup(vec![s("a", "b", 0.9), s("a", "c", 0.8)], &applied);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target_doc_id, "c");

        let applied: HashSet<String> = [link_key("a", "c")].into_iter().collect();
        let out = dedup(vec![s("a", "c", 0.9)], &applied);
        assert!(out.is_empty());
    }

    #[test]
    fn idempotent() {
        let applied: HashSet<String> = [link_key("a", "d")].into_iter().collect();
        let input = vec![
            s("a", "b", 0.6),
            s("a", "c", 0.9),
            s("a", "b", 0.8),
            s("a", "d", 0.95),
            s("a", "a", 0.95),
        ];
        let once = dedup(input, &applied);
        let twice = dedup(once.clone(), &applied);
        assert_eq!(once, twice);
        let targets: Vec<_> = once.iter().map(|c| c.target_doc_id.as_str()).collect();
        assert_eq!(targets, vec!["c", "b"]);
    }

    #[test]
    fn stable_on_ties() {
        let out = dedup(vec![s("a", "x", 0.8), s("a", "y", 0.8)], &HashSet::new());
        assert_eq!(out[0].target_doc_id, "x");
    }
}
