//! Tag extraction for the tag index.
//!
//! Tags come from the frontmatter `tags` field plus inline `#tag` tokens in
//! the body. Inline extraction strips markdown constructs that contain `#`
//! without being tags (headings, code, links, URLs).

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use tessera_core::Document;

static HASHTAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^a-zA-Z0-9_/-])#([a-zA-Z][a-zA-Z0-9_/-]*)").expect("hashtag regex")
});
static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*\n.*?```").expect("code block regex"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").expect("inline code regex"));
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("markdown link regex"));
static WIKILINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[[^\]]*\]\]").expect("wikilink regex"));
static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s<>\[\]()]+|www\.[^\s<>\[\]()]+").expect("url regex")
});

/// Extract inline hashtags from markdown content.
///
/// Returns lowercase, deduplicated, sorted tag names. Numeric-only tokens,
/// headings, code, link anchors, and URL fragments are ignored.
pub fn extract_inline_hashtags(content: &str) -> Vec<String> {
    let text = CODE_BLOCK.replace_all(content, "");
    let text = INLINE_CODE.replace_all(&text, "");
    let text = remove_headings(&text);
    let text = MARKDOWN_LINK.replace_all(&text, "$1");
    let text = WIKILINK.replace_all(&text, "");
    let text = URL.replace_all(&text, "");

    let tags: BTreeSet<String> = HASHTAG
        .captures_iter(&text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim_end_matches('/').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tags.into_iter().collect()
}

fn remove_headings(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            if !trimmed.starts_with('#') {
                return true;
            }
            let after = trimmed.trim_start_matches('#');
            !(after.is_empty() || after.starts_with(' '))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize a frontmatter tag: strip a leading `#`, trim, lowercase.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#').trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

/// All tags of a document: frontmatter `tags` plus inline hashtags.
pub fn document_tags(doc: &Document) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = doc
        .field_list("tags")
        .iter()
        .filter_map(|t| normalize_tag(t))
        .collect();
    tags.extend(extract_inline_hashtags(&doc.content));
    tags
}
