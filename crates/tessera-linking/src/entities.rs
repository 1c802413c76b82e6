//! Entity extraction.
//!
//! Extractors form an ordered chain: each one maps a document to a list of
//! typed entities, and the chain concatenates them, dropping repeats. New
//! entity sources plug in as another [`EntityExtractor`] without touching the
//! matchers.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use tessera_core::Document;

/// Kind of an extracted entity. The order of the typed variants is the
/// precedence in which frontmatter fields are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Merchant,
    Account,
    Category,
    Currency,
    Attendee,
    Location,
    Calendar,
    MeetingType,
    Organizer,
    Status,
    Person,
    Organization,
}

impl EntityKind {
    /// Prefix used in entity index keys.
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Merchant => "merchant",
            EntityKind::Account => "account",
            EntityKind::Category => "category",
            EntityKind::Currency => "currency",
            EntityKind::Attendee => "attendee",
            EntityKind::Location => "location",
            EntityKind::Calendar => "calendar",
            EntityKind::MeetingType => "meeting-type",
            EntityKind::Organizer => "organizer",
            EntityKind::Status => "status",
            EntityKind::Person => "person",
            EntityKind::Organization => "organization",
        }
    }

    /// Base confidence when two documents share an entity of this kind.
    pub fn base_confidence(&self) -> f64 {
        match self {
            EntityKind::Account => 0.90,
            EntityKind::Merchant => 0.85,
            EntityKind::Organizer => 0.85,
            EntityKind::Attendee => 0.80,
            EntityKind::Calendar => 0.80,
            EntityKind::Location => 0.75,
            EntityKind::MeetingType => 0.70,
            EntityKind::Category => 0.60,
            EntityKind::Status => 0.50,
            EntityKind::Currency | EntityKind::Person | EntityKind::Organization => 0.70,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One entity extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedEntity {
    pub kind: EntityKind,
    pub value: String,
}

impl TypedEntity {
    pub fn new(kind: EntityKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Entity index key, `kind:value` with the value lowercased.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind.prefix(), self.value.trim().to_lowercase())
    }
}

/// Strategy for pulling entities out of a document.
pub trait EntityExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, doc: &Document) -> Vec<TypedEntity>;
}

// =============================================================================
// FRONTMATTER
// =============================================================================

/// Frontmatter fields read per entity kind, in precedence order. Aliases
/// cover the field names written by the transaction and calendar importers.
const FIELD_MAP: &[(EntityKind, &[&str])] = &[
    (EntityKind::Merchant, &["merchant", "merchant_name"]),
    (EntityKind::Account, &["account", "account_id"]),
    (EntityKind::Category, &["category", "categories"]),
    (EntityKind::Currency, &["currency", "iso_currency_code"]),
    (EntityKind::Attendee, &["attendees", "attendee"]),
    (EntityKind::Location, &["location"]),
    (EntityKind::Calendar, &["calendar", "calendar_name"]),
    (EntityKind::MeetingType, &["meeting_type"]),
    (EntityKind::Organizer, &["organizer"]),
    (EntityKind::Status, &["status"]),
];

/// Typed entities from frontmatter fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrontmatterEntityExtractor;

impl EntityExtractor for FrontmatterEntityExtractor {
    fn name(&self) -> &'static str {
        "frontmatter"
    }

    fn extract(&self, doc: &Document) -> Vec<TypedEntity> {
        let mut out = Vec::new();
        for (kind, fields) in FIELD_MAP {
            for field in *fields {
                let values = doc.field_list(field);
                if values.is_empty() {
                    continue;
                }
                out.extend(values.into_iter().map(|v| TypedEntity::new(*kind, v)));
                break;
            }
        }
        out
    }
}

// =============================================================================
// CAPITALIZED PHRASES
// =============================================================================

static PERSON_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+ [A-Z][a-z]+)\b").expect("person name regex"));
static COMPANY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b((?:[A-Z][A-Za-z0-9&]*\s+)+(?:Inc|LLC|Ltd|Corp|Corporation|Company|Co|GmbH)\b\.?)")
        .expect("company regex")
});

/// Person names and company names found in the title and body.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapitalizedPhraseExtractor;

impl EntityExtractor for CapitalizedPhraseExtractor {
    fn name(&self) -> &'static str {
        "capitalized-phrase"
    }

    fn extract(&self, doc: &Document) -> Vec<TypedEntity> {
        let text = format!("{}\n{}", doc.title, doc.content);
        let mut out: Vec<TypedEntity> = COMPANY
            .captures_iter(&text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                TypedEntity::new(
                    EntityKind::Organization,
                    m.as_str().trim_end_matches('.').trim(),
                )
            })
            .collect();
        let people: Vec<TypedEntity> = PERSON_NAME
            .captures_iter(&text)
            .filter_map(|c| c.get(1))
            .filter(|m| !out.iter().any(|o| o.value.contains(m.as_str())))
            .map(|m| TypedEntity::new(EntityKind::Person, m.as_str()))
            .collect();
        out.extend(people);
        out
    }
}

// =============================================================================
// CHAIN
// =============================================================================

/// Ordered list of extractors applied to every document.
pub struct EntityExtractorChain {
    extractors: Vec<Box<dyn EntityExtractor>>,
}

impl Default for EntityExtractorChain {
    fn default() -> Self {
        Self::empty()
            .with(FrontmatterEntityExtractor)
            .with(CapitalizedPhraseExtractor)
    }
}

impl EntityExtractorChain {
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Append an extractor to the end of the chain.
    pub fn with(mut self, extractor: impl EntityExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Entities from every extractor in order; repeated keys keep the first.
    pub fn extract(&self, doc: &Document) -> Vec<TypedEntity> {
        let mut seen = HashSet::new();
        self.extractors
            .iter()
            .flat_map(|e| e.extract(doc))
            .filter(|e| !e.value.trim().is_empty() && seen.insert(e.key()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXN: &str = "---\ntype: transaction\nmerchant_name: Blue Bottle\naccount_id: acc-1\ncategory: [Food and Drink, Coffee Shop]\niso_currency_code: USD\n---\nCoffee\n";

    #[test]
    fn frontmatter_precedence_and_aliases() {
        let doc = Document::parse("t.md", TXN);
        let keys: Vec<_> = FrontmatterEntityExtractor
            .extract(&doc)
            .iter()
            .map(TypedEntity::key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "merchant:blue bottle",
                "account:acc-1",
                "category:food and drink",
                "category:coffee shop",
                "currency:usd",
            ]
        );
    }

    #[test]
    fn attendees_are_each_an_entity() {
        let doc = Document::parse(
            "e.md",
            "---\ntype: event\nattendees: [a@x.com, b@x.com]\nmeeting_type: meeting\n---\n",
        );
        let entities = FrontmatterEntityExtractor.extract(&doc);
        assert_eq!(
            entities
                .iter()
                .filter(|e| e.kind == EntityKind::Attendee)
                .count(),
            2
        );
        assert!(entities.iter().any(|e| e.key() == "meeting-type:meeting"));
    }

    #[test]
    fn capitalized_phrases() {
        let doc = Document::parse(
            "n.md",
            "Met with Jane Doe from Acme Widgets Inc. about the contract.",
        );
        let entities = CapitalizedPhraseExtractor.extract(&doc);
        assert!(entities
            .iter()
            .any(|e| e.kind == EntityKind::Organization && e.value == "Acme Widgets Inc"));
        assert!(entities
            .iter()
            .any(|e| e.kind == EntityKind::Person && e.value == "Jane Doe"));
    }

    #[test]
    fn chain_dedups_keys() {
        let chain = EntityExtractorChain::default()
            .with(FrontmatterEntityExtractor);
        let doc = Document::parse("t.md", TXN);
        let all = chain.extract(&doc);
        let unique: HashSet<_> = all.iter().map(TypedEntity::key).collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(chain.names(), vec!["frontmatter", "capitalized-phrase", "frontmatter"]);
    }

    #[test]
    fn base_confidence_table() {
        assert_eq!(EntityKind::Account.base_confidence(), 0.90);
        assert_eq!(EntityKind::Status.base_confidence(), 0.50);
        assert_eq!(EntityKind::Person.base_confidence(), 0.70);
    }
}
