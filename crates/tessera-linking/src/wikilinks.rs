//! Wikilink scanning and resolution.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use tessera_core::{link_name_for, Document};

static WIKILINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!?\[\[([^\]|#]+)(?:#[^\]|]*)?(?:\|[^\]]*)?\]\]").expect("wikilink regex"));

/// Raw link targets of every `[[target]]`, `[[target|alias]]`, and
/// `[[target#heading]]` in `content`, in order of appearance.
pub fn extract_wikilink_targets(content: &str) -> Vec<String> {
    WIKILINK
        .captures_iter(content)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Resolves wikilink targets to document ids.
///
/// Full link names win; a bare basename resolves only when it is unique.
pub struct LinkResolver {
    by_name: HashMap<String, String>,
    by_basename: HashMap<String, Option<String>>,
}

impl LinkResolver {
    pub fn new<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_basename: HashMap<String, Option<String>> = HashMap::new();
        for doc in docs {
            by_name.insert(doc.link_name().to_lowercase(), doc.id.clone());
            by_basename
                .entry(doc.basename().to_lowercase())
                .and_modify(|slot| *slot = None)
                .or_insert_with(|| Some(doc.id.clone()));
        }
        Self {
            by_name,
            by_basename,
        }
    }

    pub fn resolve(&self, target: &str) -> Option<&str> {
        let key = link_name_for(target.trim()).to_lowercase();
        self.by_name
            .get(&key)
            .or_else(|| self.by_basename.get(&key).and_then(Option::as_ref))
            .map(String::as_str)
    }
}
