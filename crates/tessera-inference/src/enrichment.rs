//! Per-document LLM enrichment.
//!
//! Each document gets its own `enhance` call; the calls run concurrently and
//! one failure never affects the others. Every failure becomes a rejected,
//! zero-confidence placeholder item so batch counts stay consistent.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use tessera_core::{
    Document, Evidence, GeneratedSuggestion, LinkSuggestion, LinkType, SuggestionItem,
    TextGenerator,
};

/// Resolves generator-proposed targets against the known corpus.
///
/// Accepts a full id or a link name, then falls back to a unique basename.
/// Matching is case-insensitive.
pub struct TargetResolver {
    exact: HashMap<String, String>,
    basenames: HashMap<String, Option<String>>,
}

impl TargetResolver {
    pub fn new<'a>(corpus: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut exact = HashMap::new();
        let mut basenames: HashMap<String, Option<String>> = HashMap::new();
        for doc in corpus {
            exact.insert(doc.id.to_lowercase(), doc.id.clone());
            exact.insert(doc.link_name().to_lowercase(), doc.id.clone());
            basenames
                .entry(doc.basename().to_lowercase())
                .and_modify(|slot| *slot = None)
                .or_insert_with(|| Some(doc.id.clone()));
        }
        Self { exact, basenames }
    }

    pub fn resolve(&self, target: &str) -> Option<&str> {
        let key = target.trim().to_lowercase();
        self.exact
            .get(&key)
            .map(String::as_str)
            .or_else(|| self.basenames.get(&key).and_then(|slot| slot.as_deref()))
    }
}

fn to_item(
    doc: &Document,
    answer: GeneratedSuggestion,
    resolver: &TargetResolver,
) -> SuggestionItem {
    let Some(proposed) = answer.target.as_deref() else {
        return SuggestionItem::enrichment_placeholder(&doc.id, "no target proposed");
    };
    let Some(target) = resolver.resolve(proposed) else {
        return SuggestionItem::enrichment_placeholder(
            &doc.id,
            format!("unknown target: {}", proposed),
        );
    };
    if target == doc.id {
        return SuggestionItem::enrichment_placeholder(&doc.id, "self link proposed");
    }

    let confidence = (answer.confidence.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
    let mut suggestion = LinkSuggestion::new(
        doc.id.as_str(),
        target,
        LinkType::LlmSuggested,
        confidence,
        Evidence::rule("llm-enrichment").with_reasoning(answer.reasoning),
    );
    if let Some(text) = answer.link_text {
        suggestion = suggestion.with_link_text(text);
    }
    suggestion.into()
}

/// Ask `generator` about every document in `docs`, one item per document.
///
/// `corpus` is the set of documents a proposal may point to.
#[instrument(skip_all, fields(subsystem = "inference", op = "enrich_documents", model = generator.model_name(), document_count = docs.len()))]
pub async fn enrich_documents(
    generator: &dyn TextGenerator,
    docs: &[Document],
    corpus: &[Document],
) -> Vec<SuggestionItem> {
    let resolver = TargetResolver::new(corpus);
    let answers = join_all(docs.iter().map(|doc| generator.enhance(doc))).await;

    let mut failed = 0;
    let items: Vec<SuggestionItem> = docs
        .iter()
        .zip(answers)
        .map(|(doc, answer)| match answer {
            Ok(answer) => {
                debug!(doc_id = %doc.id, target = ?answer.target, "Enrichment answered");
                to_item(doc, answer, &resolver)
            }
            Err(e) => {
                warn!(doc_id = %doc.id, error = %e, "Enrichment failed, using placeholder");
                failed += 1;
                SuggestionItem::enrichment_placeholder(&doc.id, e.to_string())
            }
        })
        .collect();

    info!(items = items.len(), failed, "Enrichment pass complete");
    items
}
