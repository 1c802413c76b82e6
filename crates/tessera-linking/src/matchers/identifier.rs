//! Identifier matcher: exact matches on configured id fields.

use std::collections::BTreeSet;

use tessera_core::defaults::IDENTIFIER_CONFIDENCE;
use tessera_core::{Evidence, LinkSuggestion, LinkType};

use super::{MatchContext, Matcher};

/// Documents carrying the same value in any configured identifier field.
/// Near-certain by construction, so confidence is fixed.
pub struct IdentifierMatcher;

impl Matcher for IdentifierMatcher {
    fn name(&self) -> &'static str {
        "identifier"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        let fields: Vec<&str> = ctx
            .config
            .identifier_fields
            .iter()
            .map(String::as_str)
            .collect();

        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for field in &fields {
            let Some(value) = ctx.source.field_str(&[*field]) else {
                continue;
            };
            for target in ctx.others() {
                let matched = fields
                    .iter()
                    .any(|f| target.field_str(&[*f]).as_deref() == Some(value.as_str()));
                if matched && seen.insert(target.id.as_str()) {
                    out.push(ctx.suggest(
                        target,
                        LinkType::IdentifierBased,
                        IDENTIFIER_CONFIDENCE as f64,
                        Evidence::rule("uid-match").with_uid(value.clone()),
                    ));
                }
            }
        }
        out
    }
}
