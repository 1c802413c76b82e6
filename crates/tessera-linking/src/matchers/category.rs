//! Tag-overlap matcher.

use std::collections::BTreeMap;

use tessera_core::{Evidence, LinkSuggestion, LinkType};

use super::{MatchContext, Matcher};

const MIN_COMMON_TAGS: usize = 2;

/// Documents sharing at least two tags with the source.
pub struct CategoryMatcher;

impl Matcher for CategoryMatcher {
    fn name(&self) -> &'static str {
        "category"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        if ctx.tags.len() < MIN_COMMON_TAGS {
            return Vec::new();
        }

        let mut common: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for tag in ctx.tags {
            for target_id in ctx.index.docs_with_tag(tag) {
                if *target_id != ctx.source.id {
                    common.entry(target_id.as_str()).or_default().push(tag.clone());
                }
            }
        }

        let source_count = ctx.tags.len() as f64;
        common
            .into_iter()
            .filter(|(_, tags)| tags.len() >= MIN_COMMON_TAGS)
            .filter_map(|(target_id, tags)| {
                let target = ctx.index.document(target_id)?;
                let confidence = (0.5 + (tags.len() as f64 / source_count) * 0.3).min(0.8);
                Some(ctx.suggest(
                    target,
                    LinkType::CategoryBased,
                    confidence,
                    Evidence::rule("tag-overlap").with_common_tags(tags),
                ))
            })
            .collect()
    }
}
