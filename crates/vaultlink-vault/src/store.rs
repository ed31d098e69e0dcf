//! Document storage.
//!
//! The engine addresses documents only by [`DocPath`]; [`DocumentStore`] is
//! the seam to the durable storage. [`FsDocumentStore`] keeps documents as
//! files under the vault root.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::instrument;
use vaultlink_core::prelude::*;
use vaultlink_core::system_time_to_secs;
use walkdir::WalkDir;

/// Durable storage for vault documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document with its modification time, sorted by path
    async fn list_documents(&self) -> Result<Vec<DocumentEntry>>;

    /// Read a document's text
    async fn read(&self, path: &DocPath) -> Result<String>;

    /// Replace a document's text, creating it if needed
    async fn write(&self, path: &DocPath, content: &str) -> Result<()>;

    /// Move a document; fails if `to` exists
    async fn rename(&self, from: &DocPath, to: &DocPath) -> Result<()>;

    /// Delete a document
    async fn delete(&self, path: &DocPath) -> Result<()>;

    /// Whether a document exists
    async fn exists(&self, path: &DocPath) -> Result<bool>;

    /// Modification time in seconds since the Unix epoch
    async fn modified(&self, path: &DocPath) -> Result<f64>;
}

/// Filesystem-backed document store
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    extension: String,
    excluded: BTreeSet<String>,
    max_file_size: u64,
}

impl FsDocumentStore {
    /// Create a store for the vault described by `config`
    pub fn new(config: &EngineConfig) -> Self {
        let mut excluded = config.excluded_paths.clone();
        excluded.insert(config.index_dir.clone());

        Self {
            root: config.vault_path.clone(),
            extension: config.document_extension.clone(),
            excluded,
            max_file_size: config.max_file_size,
        }
    }

    /// Vault root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &DocPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    fn is_document_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    fn map_not_found(path: &DocPath, err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::document_not_found(path.as_str())
        } else {
            Error::io(err)
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    #[instrument(skip(self), fields(root = ?self.root), name = "store_list_documents")]
    async fn list_documents(&self) -> Result<Vec<DocumentEntry>> {
        let mut documents = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.excluded.contains(name))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable vault entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.is_document_file(entry.path()) {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| Error::other(format!("Cannot stat {}: {}", entry.path().display(), e)))?;
            if metadata.len() > self.max_file_size {
                log::debug!("Skipping oversized document {}", entry.path().display());
                continue;
            }

            let path = match DocPath::from_fs_path(&self.root, entry.path()) {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let modified = metadata.modified().map(system_time_to_secs).unwrap_or(0.0);
            documents.push(DocumentEntry { path, modified });
        }

        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(documents)
    }

    async fn read(&self, path: &DocPath) -> Result<String> {
        tokio::fs::read_to_string(self.full_path(path))
            .await
            .map_err(|e| Self::map_not_found(path, e))
    }

    #[instrument(skip(self, content), fields(file = %path, size = content.len()), name = "store_write")]
    async fn write(&self, path: &DocPath, content: &str) -> Result<()> {
        let full_path = self.full_path(path);

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::io)?;
        }

        // Write to temp file first, then atomic rename
        let temp_path = full_path.with_extension("vaultlink.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(Error::io)?;
        tokio::fs::rename(&temp_path, &full_path)
            .await
            .map_err(Error::io)?;

        Ok(())
    }

    #[instrument(skip(self), fields(from = %from, to = %to), name = "store_rename")]
    async fn rename(&self, from: &DocPath, to: &DocPath) -> Result<()> {
        let source = self.full_path(from);
        let target = self.full_path(to);

        if !tokio::fs::try_exists(&source).await.map_err(Error::io)? {
            return Err(Error::document_not_found(from.as_str()));
        }
        if tokio::fs::try_exists(&target).await.map_err(Error::io)? {
            return Err(Error::validation_error(format!("Target already exists: {}", to)));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::io)?;
        }
        tokio::fs::rename(&source, &target)
            .await
            .map_err(Error::io)
    }

    async fn delete(&self, path: &DocPath) -> Result<()> {
        tokio::fs::remove_file(self.full_path(path))
            .await
            .map_err(|e| Self::map_not_found(path, e))
    }

    async fn exists(&self, path: &DocPath) -> Result<bool> {
        tokio::fs::try_exists(self.full_path(path))
            .await
            .map_err(Error::io)
    }

    async fn modified(&self, path: &DocPath) -> Result<f64> {
        let metadata = tokio::fs::metadata(self.full_path(path))
            .await
            .map_err(|e| Self::map_not_found(path, e))?;
        Ok(metadata.modified().map(system_time_to_secs).unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(path: &str) -> DocPath {
        DocPath::new(path).unwrap()
    }

    fn create_store() -> (FsDocumentStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::builder(temp.path()).build().unwrap();
        (FsDocumentStore::new(&config), temp)
    }

    #[tokio::test]
    async fn test_list_documents_skips_excluded() {
        let (store, temp) = create_store();
        let root = temp.path();
        std::fs::create_dir_all(root.join("notes")).unwrap();
        std::fs::create_dir_all(root.join(".obsidian")).unwrap();
        std::fs::create_dir_all(root.join(".vaultlink")).unwrap();
        std::fs::write(root.join("b.md"), "b").unwrap();
        std::fs::write(root.join("notes/a.md"), "a").unwrap();
        std::fs::write(root.join("notes/image.png"), "png").unwrap();
        std::fs::write(root.join(".obsidian/config.md"), "x").unwrap();
        std::fs::write(root.join(".vaultlink/index.md"), "x").unwrap();

        let docs = store.list_documents().await.unwrap();
        let paths: Vec<_> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["b.md", "notes/a.md"]);
        assert!(docs.iter().all(|d| d.modified > 0.0));
    }

    #[tokio::test]
    async fn test_write_read_rename_delete() {
        let (store, temp) = create_store();
        let note = doc("folder/Note.md");

        store.write(&note, "# Note").await.unwrap();
        assert_eq!(store.read(&note).await.unwrap(), "# Note");
        assert!(!temp.path().join("folder/Note.vaultlink.tmp").exists());

        let moved = doc("archive/Note.md");
        store.rename(&note, &moved).await.unwrap();
        assert!(!store.exists(&note).await.unwrap());
        assert!(store.exists(&moved).await.unwrap());
        assert!(store.modified(&moved).await.unwrap() > 0.0);

        store.delete(&moved).await.unwrap();
        assert!(matches!(
            store.read(&moved).await,
            Err(Error::DocumentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rename_refuses_existing_target() {
        let (store, _temp) = create_store();
        store.write(&doc("a.md"), "a").await.unwrap();
        store.write(&doc("b.md"), "b").await.unwrap();

        let err = store.rename(&doc("a.md"), &doc("b.md")).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.read(&doc("b.md")).await.unwrap(), "b");
    }
}
