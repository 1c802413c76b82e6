//! Time-window matcher.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::trace;

use tessera_core::defaults::{
    CHAT_WINDOW_MINUTES, EVENT_WINDOW_MINUTES, LARGE_TRANSACTION_AMOUNT,
    LARGE_TRANSACTION_WINDOW_MINUTES, MEETING_WINDOW_MINUTES, NOTE_ENHANCEMENT_WINDOW_MINUTES,
    TRANSACTION_WINDOW_MINUTES, TRAVEL_TRANSACTION_WINDOW_MINUTES,
};
use tessera_core::{Document, DocumentKind, Evidence, LinkSuggestion, LinkType};

use super::{MatchContext, Matcher};

const DATE_FIELDS: &[&str] = &["date", "datetime", "start", "timestamp"];
const TIME_FIELDS: &[&str] = &["start_time", "time"];
const TRAVEL_MARKERS: &[&str] = &["travel", "hotel", "transport"];

fn parse_date_only(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| parse_date_only(value).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// One canonical timestamp per document.
///
/// Precedence: explicit date plus start time, then a date-only transaction
/// pinned to noon, then a generic parse of the date field.
pub fn document_timestamp(doc: &Document) -> Option<NaiveDateTime> {
    let date_value = doc.field_str(DATE_FIELDS)?;

    if let Some(date) = parse_date_only(&date_value) {
        if let Some(time) = doc.field_str(TIME_FIELDS).and_then(|t| parse_time(&t)) {
            return Some(date.and_time(time));
        }
        if doc.kind == DocumentKind::Transaction {
            return date.and_hms_opt(12, 0, 0);
        }
    }

    parse_datetime(&date_value)
}

/// Start time the document states itself, either a start-time field or a
/// date value carrying a time part. Date-only values have none.
pub fn explicit_start_time(doc: &Document) -> Option<NaiveTime> {
    if let Some(time) = doc.field_str(TIME_FIELDS).and_then(|t| parse_time(&t)) {
        return Some(time);
    }
    let date_value = doc.field_str(DATE_FIELDS)?;
    if parse_date_only(&date_value).is_some() {
        return None;
    }
    parse_datetime(&date_value).map(|dt| dt.time())
}

fn is_travel(doc: &Document) -> bool {
    doc.field_list("category").iter().any(|c| {
        let c = c.to_lowercase();
        TRAVEL_MARKERS.iter().any(|m| c.contains(m))
    })
}

/// Matching window for a source document, in minutes.
pub fn time_window_minutes(doc: &Document, base_window: i64) -> i64 {
    match doc.kind {
        DocumentKind::CalendarEvent => {
            let meeting = doc
                .field_str(&["meeting_type"])
                .map(|t| matches!(t.to_lowercase().as_str(), "meeting" | "conference"))
                .unwrap_or(false);
            if meeting {
                MEETING_WINDOW_MINUTES
            } else {
                EVENT_WINDOW_MINUTES
            }
        }
        DocumentKind::Transaction => {
            if is_travel(doc) {
                TRAVEL_TRANSACTION_WINDOW_MINUTES
            } else if doc
                .field_f64(&["amount"])
                .map(|a| a.abs() > LARGE_TRANSACTION_AMOUNT)
                .unwrap_or(false)
            {
                LARGE_TRANSACTION_WINDOW_MINUTES
            } else {
                TRANSACTION_WINDOW_MINUTES
            }
        }
        DocumentKind::ChatThread => CHAT_WINDOW_MINUTES,
        DocumentKind::NoteEnhancement => NOTE_ENHANCEMENT_WINDOW_MINUTES,
        _ => base_window,
    }
}

/// Piecewise confidence on the minute delta.
fn bucket_confidence(delta_minutes: f64, window: i64) -> f64 {
    if delta_minutes < 1.0 {
        0.95
    } else if delta_minutes <= 15.0 {
        0.90
    } else if delta_minutes <= 60.0 {
        0.80
    } else if delta_minutes <= 240.0 {
        0.70
    } else {
        (1.0 - delta_minutes / window as f64).max(0.5)
    }
}

fn same_field(a: &Document, b: &Document, keys: &[&str]) -> bool {
    match (a.field_str(keys), b.field_str(keys)) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(&y),
        _ => false,
    }
}

fn crosses_transaction_event(a: DocumentKind, b: DocumentKind) -> bool {
    matches!(
        (a, b),
        (DocumentKind::Transaction, DocumentKind::CalendarEvent)
            | (DocumentKind::CalendarEvent, DocumentKind::Transaction)
    )
}

/// Documents whose timestamps fall inside the source's window.
pub struct TimeMatcher;

impl Matcher for TimeMatcher {
    fn name(&self) -> &'static str {
        "time"
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Vec<LinkSuggestion> {
        let Some(source_ts) = document_timestamp(ctx.source) else {
            return Vec::new();
        };
        let window = time_window_minutes(ctx.source, ctx.config.base_time_window_minutes);

        ctx.others()
            .filter_map(|target| {
                let target_ts = document_timestamp(target)?;
                let delta = (source_ts - target_ts).num_seconds().abs() as f64 / 60.0;
                if delta > window as f64 {
                    return None;
                }

                let mut confidence = bucket_confidence(delta, window);
                if same_field(ctx.source, target, &["account", "account_id"])
                    || same_field(ctx.source, target, &["calendar", "calendar_name"])
                {
                    confidence += 0.1;
                }
                if crosses_transaction_event(ctx.source.kind, target.kind) {
                    confidence -= 0.1;
                }
                trace!(target = %target.id, delta, confidence, "time candidate");

                Some(ctx.suggest(
                    target,
                    LinkType::TimeBased,
                    confidence,
                    Evidence::rule("time-window").with_time_diff(delta.round()),
                ))
            })
            .collect()
    }
}
