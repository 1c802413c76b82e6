//! Document store implementations.
//!
//! [`FilesystemDocumentStore`] serves a vault directory of markdown files;
//! [`MemoryDocumentStore`] keeps everything in a map for hosts and tests.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use tessera_core::{Document, DocumentStore, Error, Result};

/// Reject absolute paths and parent-directory traversal.
fn validate_doc_path(path: &str) -> Result<()> {
    let p = Path::new(path);
    if path.is_empty()
        || p.components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::InvalidInput(format!("invalid document path: {}", path)));
    }
    Ok(())
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Markdown vault on the local filesystem.
///
/// Document ids are paths relative to the vault root with `/` separators.
/// Hidden directories (`.obsidian`, `.tessera`, ...) are not listed.
pub struct FilesystemDocumentStore {
    root: PathBuf,
}

impl FilesystemDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        validate_doc_path(path)?;
        Ok(self.root.join(path))
    }

    async fn markdown_files(&self) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') {
                    continue;
                }
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() && name.ends_with(".md") {
                    if let Ok(rel) = path.strip_prefix(&self.root) {
                        let id = rel
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        found.push(id);
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl DocumentStore for FilesystemDocumentStore {
    async fn read(&self, path: &str) -> Result<String> {
        let full_path = self.full_path(path)?;
        match fs::read_to_string(&full_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::DocumentNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(doc_id = %path, size = content.len(), "documents: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "documents: create_dir_all failed");
                e
            })?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }

    async fn list(&self) -> Result<Vec<Document>> {
        let ids = self.markdown_files().await?;
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            match fs::read_to_string(self.root.join(&id)).await {
                Ok(raw) => docs.push(Document::parse(id, &raw)),
                Err(e) => warn!(doc_id = %id, error = %e, "documents: skipping unreadable file"),
            }
        }
        Ok(docs)
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Map-backed document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `(path, content)` pairs.
    pub fn with_documents<I, P, C>(docs: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            docs: RwLock::new(
                docs.into_iter()
                    .map(|(p, c)| (p.into(), c.into()))
                    .collect(),
            ),
        }
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, path: &str) -> Result<String> {
        self.docs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound(path.to_string()))
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        validate_doc_path(path)?;
        self.docs
            .write()
            .await
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.docs.read().await.contains_key(path))
    }

    async fn list(&self) -> Result<Vec<Document>> {
        Ok(self
            .docs
            .read()
            .await
            .iter()
            .filter(|(path, _)| path.ends_with(".md"))
            .map(|(path, raw)| Document::parse(path.clone(), raw))
            .collect())
    }
}
