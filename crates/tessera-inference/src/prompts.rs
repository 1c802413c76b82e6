//! Prompt construction and answer parsing for relationship enrichment.

use tessera_core::defaults::PROMPT_CONTENT_CHARS;
use tessera_core::{Document, Error, GeneratedSuggestion, Result};

/// System prompt for the enhancement call.
pub const ENHANCE_SYSTEM_PROMPT: &str = "You connect notes in a personal knowledge vault. \
Given one note, propose the single most relevant other note it should link to. \
Answer with a JSON object only.";

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// User prompt describing `doc`.
pub fn enhancement_prompt(doc: &Document) -> String {
    let mut fields = String::new();
    for (key, value) in &doc.frontmatter {
        if let Some(s) = value.as_str() {
            fields.push_str(&format!("- {}: {}\n", key, s));
        } else if !value.is_null() {
            fields.push_str(&format!("- {}: {}\n", key, value));
        }
    }

    format!(
        r#"Note: "{}" ({})
Kind: {}

Fields:
{}
Content:
{}

Respond with JSON:
{{"target": "<name of the note to link, or null>", "confidence": <0.0-1.0>, "reasoning": "<one sentence>", "link_text": "<optional display text or null>"}}
"#,
        doc.title,
        doc.link_name(),
        doc.kind.as_str(),
        fields,
        truncate_chars(doc.content.trim(), PROMPT_CONTENT_CHARS),
    )
}

/// Extract the JSON object from a model answer.
///
/// Tolerates code fences and prose around the object.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Parse a model answer into a [`GeneratedSuggestion`].
///
/// Confidence is clamped to `[0, 1]`; empty targets and link texts become `None`.
pub fn parse_generated(response: &str) -> Result<GeneratedSuggestion> {
    let json = extract_json_object(response)
        .ok_or_else(|| Error::Enrichment("no JSON object in response".to_string()))?;
    let mut parsed: GeneratedSuggestion = serde_json::from_str(json)
        .map_err(|e| Error::Enrichment(format!("Failed to parse answer: {}", e)))?;

    parsed.confidence = if parsed.confidence.is_finite() {
        parsed.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    parsed.target = parsed
        .target
        .map(|t| t.trim().trim_start_matches("[[").trim_end_matches("]]").to_string())
        .filter(|t| !t.is_empty());
    parsed.link_text = parsed
        .link_text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Ok(parsed)
}

/// Non-empty, trimmed lines of a free-form answer, list markers removed.
pub fn answer_lines(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|l| l.trim().trim_start_matches(['-', '*']).trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
