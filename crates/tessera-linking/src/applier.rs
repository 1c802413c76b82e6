//! Link applier: materializes an approved suggestion as a wikilink.
//!
//! The link `[[target]]` is written into the source document under a
//! `## Related` section, followed by a short reason derived from the
//! evidence. Application is idempotent: a link already present in any of its
//! usual renderings is not written again. Bidirectional suggestions also
//! write the mirrored link into the target, once.
//!
//! Writes to one document are serialized by a per-document async lock so two
//! concurrent applications to the same document cannot lose an update.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use tessera_core::defaults::RELATED_SECTION_HEADING;
use tessera_core::{link_name_for, DocumentStore, Error, LinkSuggestion, LinkType, Result};

use crate::index::IndexState;

/// Lazily created async mutex per key.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub async fn get(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Human readable reason appended after the link.
pub fn link_reason(suggestion: &LinkSuggestion) -> String {
    let evidence = &suggestion.evidence;
    let first_two = |items: &[String]| items.iter().take(2).cloned().collect::<Vec<_>>().join(", ");

    match suggestion.link_type {
        LinkType::TimeBased => match evidence.time_diff_minutes {
            Some(minutes) => format!("occurred {}min apart", minutes.round() as i64),
            None => "same time".to_string(),
        },
        LinkType::EntityBased if !evidence.matched_entities.is_empty() => {
            format!("shared: {}", first_two(&evidence.matched_entities))
        }
        LinkType::LocationBased => match evidence.distance {
            Some(d) if d > 0.0 => format!("{}m apart", d.round() as i64),
            _ => "same location".to_string(),
        },
        LinkType::CategoryBased if !evidence.common_tags.is_empty() => {
            format!("tags: {}", first_two(&evidence.common_tags))
        }
        LinkType::IdentifierBased if evidence.uid_match.is_some() => {
            format!("ID: {}", evidence.uid_match.as_deref().unwrap_or_default())
        }
        LinkType::LlmSuggested => evidence
            .reasoning
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "AI suggested".to_string()),
        _ => evidence
            .reasoning
            .clone()
            .unwrap_or_else(|| suggestion.link_type.to_string()),
    }
}

/// True if `content` already links to `target_id` in any usual rendering:
/// `[[name]]`, `[[name|alias]]`, `[[name#heading]]`, the bare basename
/// forms, or the custom link text.
pub fn has_link(content: &str, target_id: &str, link_text: Option<&str>) -> bool {
    let name = link_name_for(target_id);
    let basename = name.rsplit('/').next().unwrap_or(name);

    let mut renderings = Vec::new();
    for n in [name, basename, target_id] {
        renderings.push(format!("[[{}]]", n));
        renderings.push(format!("[[{}|", n));
        renderings.push(format!("[[{}#", n));
    }
    if let Some(text) = link_text {
        renderings.push(format!("[[{}|{}]]", name, text));
    }
    renderings.iter().any(|r| content.contains(r.as_str()))
}

/// Insert `line` at the end of the `## Related` section, creating the
/// section at the end of the document if missing. CRLF documents stay CRLF.
pub fn insert_related(content: &str, line: &str) -> String {
    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let lines: Vec<&str> = content.lines().collect();
    let Some(heading) = lines
        .iter()
        .position(|l| l.trim() == RELATED_SECTION_HEADING)
    else {
        let body = content.trim_end();
        return if body.is_empty() {
            format!("{}{}{}{}", RELATED_SECTION_HEADING, eol, line, eol)
        } else {
            format!("{}{}{}{}{}{}{}", body, eol, eol, RELATED_SECTION_HEADING, eol, line, eol)
        };
    };

    let section_end = lines[heading + 1..]
        .iter()
        .position(|l| l.starts_with("# ") || l.starts_with("## "))
        .map(|i| heading + 1 + i)
        .unwrap_or(lines.len());
    let insert_at = lines[heading + 1..section_end]
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|i| heading + 2 + i)
        .unwrap_or(heading + 1);

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 1);
    out.extend_from_slice(&lines[..insert_at]);
    out.push(line);
    out.extend_from_slice(&lines[insert_at..]);
    let mut joined = out.join(eol);
    joined.push_str(eol);
    joined
}

fn render_line(suggestion: &LinkSuggestion) -> String {
    let name = link_name_for(&suggestion.target_doc_id);
    let link = match suggestion.metadata.link_text.as_deref() {
        Some(text) if !text.trim().is_empty() => format!("[[{}|{}]]", name, text.trim()),
        _ => format!("[[{}]]", name),
    };
    format!("- {} - {}", link, link_reason(suggestion))
}

/// Writes approved links into document content.
pub struct LinkApplier {
    docs: Arc<dyn DocumentStore>,
    locks: KeyedLocks,
}

impl LinkApplier {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            locks: KeyedLocks::default(),
        }
    }

    /// Apply one suggestion, plus its mirror when bidirectional.
    ///
    /// Returns the number of links written to content. Pairs are recorded
    /// as applied even when the link was already present.
    #[instrument(skip(self, state, suggestion), fields(
        source = %suggestion.source_doc_id,
        target = %suggestion.target_doc_id,
        link_type = %suggestion.link_type,
    ))]
    pub async fn apply(
        &self,
        state: &RwLock<IndexState>,
        suggestion: &LinkSuggestion,
    ) -> Result<usize> {
        let mut written = 0;
        let mut next = Some(suggestion.clone());

        while let Some(current) = next.take() {
            if self.write_one(&current).await? {
                written += 1;
            }

            let mut guard = state.write().await;
            guard.record_applied(&current);
            // Check the reverse pair before mirroring so the mirror never
            // mirrors back.
            if current.metadata.bidirectional
                && current.id == suggestion.id
                && !guard.is_applied(&current.target_doc_id, &current.source_doc_id)
            {
                next = Some(current.mirrored());
            }
        }

        debug!(written, "Link applied");
        Ok(written)
    }

    async fn write_one(&self, suggestion: &LinkSuggestion) -> Result<bool> {
        if suggestion.source_doc_id == suggestion.target_doc_id {
            return Err(Error::InvalidInput(format!(
                "self link on {}",
                suggestion.source_doc_id
            )));
        }
        if !self.docs.exists(&suggestion.target_doc_id).await? {
            return Err(Error::DocumentNotFound(suggestion.target_doc_id.clone()));
        }

        let lock = self.locks.get(&suggestion.source_doc_id).await;
        let _guard = lock.lock().await;

        let content = self.docs.read(&suggestion.source_doc_id).await?;
        if has_link(
            &content,
            &suggestion.target_doc_id,
            suggestion.metadata.link_text.as_deref(),
        ) {
            return Ok(false);
        }

        let updated = insert_related(&content, &render_line(suggestion));
        self.docs.write(&suggestion.source_doc_id, &updated).await?;
        Ok(true)
    }
}
