//! Shared-entity matcher.

use std::collections::BTreeMap;

use tracing::trace;

use tessera_core::{Evidence, LinkSuggestion, LinkType};

use super::{MatchContext, Matcher};
use crate::entities::{EntityKind, TypedEntity};

const TITLE_BONUS: f64 = 0.10;
const SPECIFIC_ENTITY_BONUS: f64 = 0.05;

fn entity_confidence(entity: &TypedEntity, target_title: &str) -> f64 {
    let mut confidence = entity.kind.base_confidence();
    let value = entity.value.to_lowercase();
    if !value.is_empty() && target_title.to_lowercase().contains(&value) {
        confidence += TITLE_BONUS;
    }
    let specific = match entity.kind {
        EntityKind::Attendee => value.contains('@'),
        EntityKind::Calendar => value.contains("work") || value.contains("personal"),
        _ => false,
    };
    if specific {
        confidence += SPECIFIC_ENTITY_BONUS;
    }
    confidence
}

/// Documents sharing a typed entity with the source.
///
/// One candidate per target, scored by its strongest shared entity, with
/// every shared entity listed in the evidence.
pub struct EntityMatcher;

impl Matcher for EntityMatcher {
    fn name(&self) -> &'static str {
        "entity"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        // target id -> (best confidence, shared entity values)
        let mut hits: BTreeMap<&str, (f64, Vec<String>)> = BTreeMap::new();

        for entity in ctx.entities {
            for target_id in ctx.index.docs_with_entity(&entity.key()) {
                if *target_id == ctx.source.id {
                    continue;
                }
                let Some(target) = ctx.index.document(target_id) else {
                    continue;
                };
                let confidence = entity_confidence(entity, &target.title);
                trace!(target = %target_id, entity = %entity.key(), confidence, "entity candidate");

                let slot = hits.entry(target.id.as_str()).or_insert((0.0, Vec::new()));
                slot.0 = slot.0.max(confidence);
                if !slot.1.contains(&entity.value) {
                    slot.1.push(entity.value.clone());
                }
            }
        }

        hits.into_iter()
            .filter(|(_, (confidence, _))| {
                super::finalize_confidence(*confidence) >= ctx.config.fuzzy_match_threshold
            })
            .filter_map(|(target_id, (confidence, shared))| {
                let target = ctx.index.document(target_id)?;
                Some(ctx.suggest(
                    target,
                    LinkType::EntityBased,
                    confidence,
                    Evidence::rule("shared-entity").with_entities(shared),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::run;
    use super::*;
    use tessera_core::{Document, LinkingConfig};

    #[test]
    fn merchant_match_with_title_bonus() {
        let docs = vec![
            Document::parse("a.md", "---\ntype: transaction\nmerchant: Blue Bottle\n---\n"),
            Document::parse(
                "b.md",
                "---\ntype: transaction\nmerchant: Blue Bottle\ntitle: Blue Bottle refill\n---\n",
            ),
            Document::parse("c.md", "---\ntype: transaction\nmerchant: Starbucks\n---\n"),
        ];
        let out = run(&EntityMatcher, docs, "a.md", &LinkingConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target_doc_id, "b.md");
        assert_eq!(out[0].confidence, 0.95);
        assert_eq!(out[0].evidence.matched_entities, vec!["Blue Bottle"]);
    }

    #[test]
    fn weak_entities_fall_below_fuzzy_threshold() {
        let docs = vec![
            Document::parse("a.md", "---\ncategory: Groceries\nstatus: confirmed\n---\n"),
            Document::parse("b.md", "---\ncategory: Groceries\nstatus: confirmed\n---\n"),
        ];
        let out = run(&EntityMatcher, docs, "a.md", &LinkingConfig::default());
        assert!(out.is_empty());
    }

    #[test]
    fn attendee_email_bonus_and_best_entity_wins() {
        let docs = vec![
            Document::parse("a.md", "---\ntype: event\nattendees: [bob@x.com]\nstatus: confirmed\n---\n"),
            Document::parse("b.md", "---\ntype: event\nattendees: [bob@x.com]\nstatus: confirmed\n---\n"),
        ];
        let out = run(&EntityMatcher, docs, "a.md", &LinkingConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.85);
        assert_eq!(out[0].evidence.matched_entities.len(), 2);
    }

    #[test]
    fn shared_currency_scores_as_unlisted_kind() {
        let docs = vec![
            Document::parse("a.md", "---\ntype: transaction\niso_currency_code: USD\n---\n"),
            Document::parse("b.md", "---\ntype: transaction\ncurrency: usd\n---\n"),
        ];
        let out = run(&EntityMatcher, docs, "a.md", &LinkingConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target_doc_id, "b.md");
        assert_eq!(out[0].confidence, 0.70);
    }

    #[test]
    fn work_calendar_bonus() {
        let entity = TypedEntity::new(EntityKind::Calendar, "Work");
        assert!((entity_confidence(&entity, "Standup") - 0.85).abs() < 1e-9);
        let entity = TypedEntity::new(EntityKind::Calendar, "Family");
        assert!((entity_confidence(&entity, "Standup") - 0.80).abs() < 1e-9);
    }
}
