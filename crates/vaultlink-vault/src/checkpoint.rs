//! Checkpoints for multi-document operations.
//!
//! A checkpoint captures every document (content and modification time) so
//! a failed batch can put the vault back exactly as it was: same paths, same
//! bytes, same mtimes. Documents created after the checkpoint are removed on
//! rollback, along with directories that did not exist before.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::instrument;
use vaultlink_core::prelude::*;
use walkdir::WalkDir;

/// Handle to a recoverable snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointToken {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Number of documents captured
    pub documents: usize,
}

/// Snapshot and restore capability used by batch operations
#[async_trait]
pub trait CheckpointService: Send + Sync {
    /// Capture the current vault state
    async fn create_checkpoint(&self) -> Result<CheckpointToken>;

    /// Restore the vault to the captured state
    async fn rollback_to(&self, token: &CheckpointToken) -> Result<()>;

    /// Release a checkpoint that is no longer needed
    async fn discard(&self, token: &CheckpointToken) -> Result<()>;
}

/// One captured document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackupEntry {
    path: DocPath,
    backup_file: String,
    /// Modification time in nanoseconds since the Unix epoch
    modified_nanos: u128,
}

/// Everything needed to restore a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    token: CheckpointToken,
    entries: Vec<BackupEntry>,
    /// Vault-relative directories that existed at checkpoint time
    directories: BTreeSet<String>,
}

/// Checkpoints stored as file copies in a backup directory
pub struct SnapshotCheckpoints {
    vault_root: PathBuf,
    backup_root: PathBuf,
    extension: String,
    excluded: BTreeSet<String>,
    manifests: Mutex<HashMap<String, Manifest>>,
}

impl SnapshotCheckpoints {
    /// Create a checkpoint service for the vault described by `config`
    pub fn new(config: &EngineConfig) -> Self {
        let backup_root = config
            .checkpoint_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("vaultlink-checkpoints"));
        let mut excluded = config.excluded_paths.clone();
        excluded.insert(config.index_dir.clone());

        Self {
            vault_root: config.vault_path.clone(),
            backup_root,
            extension: config.document_extension.clone(),
            excluded,
            manifests: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding checkpoint data
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    fn checkpoint_dir(&self, id: &str) -> PathBuf {
        self.backup_root.join(id)
    }

    /// Current documents and directories, vault-relative
    fn scan(&self) -> Result<(Vec<(DocPath, PathBuf)>, BTreeSet<String>)> {
        let mut documents = Vec::new();
        let mut directories = BTreeSet::new();

        let walker = WalkDir::new(&self.vault_root)
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
            let entry = entry.map_err(|e| Error::checkpoint(format!("Cannot scan vault: {}", e)))?;
            if entry.depth() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.vault_root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");

            if entry.file_type().is_dir() {
                directories.insert(relative);
            } else if entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
            {
                documents.push((DocPath::new(&relative)?, entry.path().to_path_buf()));
            }
        }

        documents.sort();
        Ok((documents, directories))
    }

    async fn load_manifest(&self, id: &str) -> Result<Manifest> {
        if let Some(manifest) = self.manifests.lock().await.get(id) {
            return Ok(manifest.clone());
        }

        let path = self.checkpoint_dir(id).join("manifest.json");
        let bytes = fs::read(&path)
            .await
            .map_err(|e| Error::checkpoint(format!("Checkpoint {} unavailable: {}", id, e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::checkpoint(format!("Checkpoint {} unreadable: {}", id, e)))
    }
}

/// Stable backup file name for a document path
fn backup_name(path: &DocPath) -> String {
    format!("{:x}.bak", Sha256::digest(path.as_str().as_bytes()))
}

fn set_modified(path: &Path, nanos: u128) -> std::io::Result<()> {
    let time = UNIX_EPOCH + Duration::from_nanos(nanos as u64);
    std::fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(time)
}

#[async_trait]
impl CheckpointService for SnapshotCheckpoints {
    #[instrument(skip(self), name = "checkpoint_create")]
    async fn create_checkpoint(&self) -> Result<CheckpointToken> {
        let id = uuid::Uuid::new_v4().to_string();
        let dir = self.checkpoint_dir(&id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::checkpoint(format!("Cannot create {}: {}", dir.display(), e)))?;

        let (documents, directories) = self.scan()?;
        let mut entries = Vec::with_capacity(documents.len());

        for (path, full_path) in documents {
            let backup_file = backup_name(&path);
            let metadata = fs::metadata(&full_path).await.map_err(Error::io)?;
            let modified_nanos = metadata
                .modified()
                .map_err(Error::io)?
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos();

            fs::copy(&full_path, dir.join(&backup_file))
                .await
                .map_err(|e| Error::checkpoint(format!("Cannot back up {}: {}", path, e)))?;

            entries.push(BackupEntry {
                path,
                backup_file,
                modified_nanos,
            });
        }

        let token = CheckpointToken {
            id: id.clone(),
            created_at: Utc::now(),
            documents: entries.len(),
        };
        let manifest = Manifest {
            token: token.clone(),
            entries,
            directories,
        };

        fs::write(dir.join("manifest.json"), serde_json::to_vec_pretty(&manifest)?)
            .await
            .map_err(|e| Error::checkpoint(format!("Cannot write manifest: {}", e)))?;
        self.manifests.lock().await.insert(id, manifest);

        log::debug!("Created checkpoint {} ({} documents)", token.id, token.documents);
        Ok(token)
    }

    #[instrument(skip(self), fields(checkpoint = %token.id), name = "checkpoint_rollback")]
    async fn rollback_to(&self, token: &CheckpointToken) -> Result<()> {
        let manifest = self.load_manifest(&token.id).await?;
        let dir = self.checkpoint_dir(&token.id);

        // Remove documents that appeared after the checkpoint
        let captured: BTreeSet<&DocPath> = manifest.entries.iter().map(|e| &e.path).collect();
        let (current, _) = self.scan()?;
        for (path, full_path) in &current {
            if !captured.contains(path) {
                fs::remove_file(full_path).await.map_err(Error::io)?;
            }
        }

        // Restore captured documents byte for byte, then their mtimes
        for entry in &manifest.entries {
            let target = entry.path.to_fs_path(&self.vault_root);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await.map_err(Error::io)?;
            }
            fs::copy(dir.join(&entry.backup_file), &target)
                .await
                .map_err(|e| Error::checkpoint(format!("Cannot restore {}: {}", entry.path, e)))?;
            set_modified(&target, entry.modified_nanos).map_err(Error::io)?;
        }

        // Drop directories created since, deepest first
        let (_, directories) = self.scan()?;
        let created: Vec<&String> = directories.difference(&manifest.directories).collect();
        for created in created.into_iter().rev() {
            let full = self.vault_root.join(created);
            if fs::remove_dir(&full).await.is_err() {
                log::debug!("Leaving non-empty directory {}", full.display());
            }
        }

        log::info!(
            "Rolled back to checkpoint {} ({} documents restored)",
            token.id,
            manifest.entries.len()
        );
        Ok(())
    }

    async fn discard(&self, token: &CheckpointToken) -> Result<()> {
        self.manifests.lock().await.remove(&token.id);
        let dir = self.checkpoint_dir(&token.id);
        if fs::try_exists(&dir).await.map_err(Error::io)? {
            fs::remove_dir_all(&dir).await.map_err(Error::io)?;
        }
        Ok(())
    }
}
