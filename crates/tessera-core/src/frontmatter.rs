//! YAML frontmatter parsing for markdown documents.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::Result;
use crate::models::{Document, DocumentKind};

/// Frontmatter map keyed by field name.
pub type Frontmatter = BTreeMap<String, JsonValue>;

/// Split `---` fenced YAML frontmatter from the markdown body.
///
/// Returns an empty map and the whole input when there is no frontmatter.
/// Malformed YAML is an error.
pub fn split_frontmatter(raw: &str) -> Result<(Frontmatter, String)> {
    let Some(rest) = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return Ok((Frontmatter::new(), raw.to_string()));
    };

    let mut yaml_end = None;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            yaml_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let Some((yaml_len, body_start)) = yaml_end else {
        return Ok((Frontmatter::new(), raw.to_string()));
    };

    let yaml = &rest[..yaml_len];
    let body = rest[body_start..].trim_start_matches(['\r', '\n']).to_string();
    if yaml.trim().is_empty() {
        return Ok((Frontmatter::new(), body));
    }

    let frontmatter: Option<Frontmatter> = serde_yaml::from_str(yaml)?;
    Ok((frontmatter.unwrap_or_default(), body))
}

/// First `# ` heading of a markdown body.
pub fn first_heading(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let title = line.strip_prefix("# ")?.trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}

impl Document {
    /// Build a document snapshot from its id and raw file content.
    ///
    /// Malformed frontmatter is logged and the document is indexed with an
    /// empty field map rather than dropped.
    pub fn parse(id: impl Into<String>, raw: &str) -> Self {
        let id = id.into();
        let (frontmatter, content) = match split_frontmatter(raw) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(doc_id = %id, error = %e, "Unreadable frontmatter, indexing body only");
                (Frontmatter::new(), raw.to_string())
            }
        };

        let kind = frontmatter
            .get("type")
            .and_then(JsonValue::as_str)
            .map(DocumentKind::from_type_field)
            .unwrap_or_default();

        let title = frontmatter
            .get("title")
            .and_then(JsonValue::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| first_heading(&content))
            .unwrap_or_else(|| {
                let name = crate::models::link_name_for(&id);
                name.rsplit('/').next().unwrap_or(name).to_string()
            });

        Document {
            id,
            kind,
            title,
            frontmatter,
            content,
            cached_at: Utc::now(),
        }
    }
}
