//! Type-specific matchers for transactions and calendar events.

use std::collections::BTreeSet;

use chrono::Timelike;

use tessera_core::{Document, DocumentKind, Evidence, LinkSuggestion, LinkType};

use super::time::explicit_start_time;
use super::{MatchContext, Matcher};

const ACCOUNT_FIELDS: &[&str] = &["account", "account_id"];

fn same_kind_others<'a>(
    ctx: &'a MatchContext<'a>,
    kind: DocumentKind,
) -> impl Iterator<Item = &'a Document> + 'a {
    ctx.others().filter(move |d| d.kind == kind)
}

// =============================================================================
// SHARED ACCOUNT
// =============================================================================

/// Transactions drawn on the same account.
pub struct SharedAccountMatcher;

impl Matcher for SharedAccountMatcher {
    fn name(&self) -> &'static str {
        "shared-account"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        if ctx.source.kind != DocumentKind::Transaction {
            return Vec::new();
        }
        let Some(account) = ctx.source.field_str(ACCOUNT_FIELDS) else {
            return Vec::new();
        };
        let source_amount = ctx.source.field_f64(&["amount"]);
        let source_category = ctx.source.field_str(&["category"]).map(|c| c.to_lowercase());

        same_kind_others(ctx, DocumentKind::Transaction)
            .filter(|t| t.field_str(ACCOUNT_FIELDS).as_deref() == Some(account.as_str()))
            .map(|target| {
                let mut confidence = 0.80;
                if let (Some(a), Some(b)) = (source_amount, target.field_f64(&["amount"])) {
                    if (a - b).abs() <= 10.0 {
                        confidence += 0.10;
                    }
                }
                let target_category = target.field_str(&["category"]).map(|c| c.to_lowercase());
                if source_category.is_some() && source_category == target_category {
                    confidence += 0.05;
                }
                ctx.suggest(
                    target,
                    LinkType::EntityBased,
                    confidence,
                    Evidence::rule("shared-account").with_entities(vec![account.clone()]),
                )
            })
            .collect()
    }
}

// =============================================================================
// SHARED ATTENDEES
// =============================================================================

fn attendee_set(doc: &Document) -> BTreeSet<String> {
    doc.field_list("attendees")
        .into_iter()
        .map(|a| a.to_lowercase())
        .collect()
}

/// Calendar events with overlapping attendee lists.
pub struct SharedAttendeeMatcher;

impl Matcher for SharedAttendeeMatcher {
    fn name(&self) -> &'static str {
        "shared-attendee"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        if ctx.source.kind != DocumentKind::CalendarEvent {
            return Vec::new();
        }
        let source_attendees = attendee_set(ctx.source);
        if source_attendees.is_empty() {
            return Vec::new();
        }

        same_kind_others(ctx, DocumentKind::CalendarEvent)
            .filter_map(|target| {
                let target_attendees = attendee_set(target);
                let common: Vec<String> = source_attendees
                    .intersection(&target_attendees)
                    .cloned()
                    .collect();
                if common.is_empty() {
                    return None;
                }
                let confidence = if source_attendees == target_attendees {
                    0.95
                } else {
                    let ratio = common.len() as f64
                        / source_attendees.len().max(target_attendees.len()) as f64;
                    0.6 + ratio * 0.3
                };
                Some(ctx.suggest(
                    target,
                    LinkType::EntityBased,
                    confidence,
                    Evidence::rule("shared-attendees").with_entities(common),
                ))
            })
            .collect()
    }
}

// =============================================================================
// MEETING SERIES
// =============================================================================

fn title_words(title: &str) -> BTreeSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Word-level Jaccard similarity of two titles (words longer than two chars).
pub fn title_jaccard(a: &str, b: &str) -> f64 {
    let (a, b) = (title_words(a), title_words(b));
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Recurring events: same meeting type, near-identical titles, same start hour.
pub struct MeetingSeriesMatcher;

impl Matcher for MeetingSeriesMatcher {
    fn name(&self) -> &'static str {
        "meeting-series"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        if ctx.source.kind != DocumentKind::CalendarEvent {
            return Vec::new();
        }
        let source_type = ctx.source.field_str(&["meeting_type"]);
        let source_hour = explicit_start_time(ctx.source).map(|t| t.hour());

        same_kind_others(ctx, DocumentKind::CalendarEvent)
            .filter_map(|target| {
                let mut score = 0.0;
                let mut reasons = Vec::new();

                if source_type.is_some() && source_type == target.field_str(&["meeting_type"]) {
                    score += 0.4;
                    reasons.push("same meeting type");
                }
                let jaccard = title_jaccard(&ctx.source.title, &target.title);
                if jaccard > 0.7 {
                    score += jaccard * 0.5;
                    reasons.push("similar title");
                }
                let target_hour = explicit_start_time(target).map(|t| t.hour());
                if source_hour.is_some() && source_hour == target_hour {
                    score += 0.3;
                    reasons.push("same start hour");
                }

                (score >= 0.6).then(|| {
                    ctx.suggest(
                        target,
                        LinkType::CategoryBased,
                        score,
                        Evidence::rule("meeting-series").with_reasoning(reasons.join(", ")),
                    )
                })
            })
            .collect()
    }
}
