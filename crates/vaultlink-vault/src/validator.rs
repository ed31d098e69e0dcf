//! Consistency validation: reconcile the index with the vault on disk.
//!
//! One pass runs Scan, Diff, Classify, Apply:
//! 1. list documents with modification times
//! 2. diff against the index into new, deleted and modified documents
//! 3. before touching the graph, pair deleted with new documents by link
//!    fingerprint to detect moves
//! 4. relabel moves, index new documents, remove deleted ones, re-index
//!    modified ones
//!
//! Timestamps recorded are the listed modification times, so a second pass
//! over an unchanged vault finds nothing to do.

use crate::index::LinkIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vaultlink_core::prelude::*;
use vaultlink_graph::{Fingerprint, GraphStore, MovePair, match_moves};

/// What a validation pass found and applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub new_files: Vec<DocPath>,
    pub deleted_files: Vec<DocPath>,
    pub modified_files: Vec<DocPath>,
    pub moved_files: Vec<MovePair>,
    pub duration_ms: u64,
}

impl ChangeReport {
    /// Total number of changes across categories
    pub fn total_changes(&self) -> usize {
        self.new_files.len()
            + self.deleted_files.len()
            + self.modified_files.len()
            + self.moved_files.len()
    }

    /// Whether the index already matched the vault
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

/// Reconciles a [`LinkIndex`] with its document store
pub struct ConsistencyValidator {
    index: Arc<LinkIndex>,
}

/// A new pair is vetoed when an alias entry already points at the new path,
/// or when the new document's name is an alias declared by some other
/// document than the one that disappeared.
fn alias_collision(graph: &GraphStore, from: &DocPath, to: &DocPath) -> bool {
    !graph.aliases_of(to).is_empty()
        || graph
            .alias_target(to.stem())
            .is_some_and(|owner| owner != from && owner != to)
}

impl ConsistencyValidator {
    /// Create a validator for `index`
    pub fn new(index: Arc<LinkIndex>) -> Self {
        Self { index }
    }

    /// Run one reconciliation pass
    pub async fn validate_and_update(&self) -> Result<ChangeReport> {
        self.validate_and_update_cancellable(&CancellationToken::new())
            .await
    }

    /// Run one reconciliation pass, checking `cancel` between documents
    #[instrument(skip(self, cancel), name = "validate_and_update")]
    pub async fn validate_and_update_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ChangeReport> {
        let tx = TransactionBuilder::new();
        let store = self.index.store();

        // Scan
        let on_disk: BTreeMap<DocPath, f64> = store
            .list_documents()
            .await?
            .into_iter()
            .map(|entry| (entry.path, entry.modified))
            .collect();

        // Diff
        let (mut new_files, mut deleted_files, modified_files) = {
            let graph = self.index.read().await;
            let new_files: Vec<DocPath> = on_disk
                .keys()
                .filter(|path| !graph.contains(path))
                .cloned()
                .collect();
            let deleted_files: Vec<DocPath> = graph
                .documents()
                .into_iter()
                .filter(|path| !on_disk.contains_key(path))
                .collect();
            let modified_files: Vec<DocPath> = on_disk
                .iter()
                .filter(|(path, modified)| {
                    graph.timestamp(path).is_some_and(|indexed| **modified > indexed)
                })
                .map(|(path, _)| path.clone())
                .collect();
            (new_files, deleted_files, modified_files)
        };

        if new_files.is_empty() && deleted_files.is_empty() && modified_files.is_empty() {
            log::debug!("Index is consistent with the vault");
            return Ok(ChangeReport {
                duration_ms: tx.elapsed_ms(),
                ..ChangeReport::default()
            });
        }

        // Read new documents once: used for fingerprints and for indexing
        let mut new_contents: BTreeMap<DocPath, String> = BTreeMap::new();
        for path in &new_files {
            if cancel.is_cancelled() {
                return Err(Error::cancelled("validate_and_update"));
            }
            match store.read(path).await {
                Ok(content) => {
                    new_contents.insert(path.clone(), content);
                }
                Err(e) => log::warn!("Failed to read new document {}: {}", path, e),
            }
        }
        new_files.retain(|path| new_contents.contains_key(path));

        // Classify
        let moved_files = {
            let graph = self.index.read().await;
            let deleted: Vec<(DocPath, Fingerprint)> = deleted_files
                .iter()
                .map(|path| (path.clone(), Fingerprint::from_graph(&graph, path)))
                .collect();
            let new: Vec<(DocPath, Fingerprint)> = new_contents
                .iter()
                .map(|(path, content)| {
                    (path.clone(), Fingerprint::from_content(&graph, path, content))
                })
                .collect();
            match_moves(&deleted, &new, |from, to| alias_collision(&graph, from, to))
        };
        new_files.retain(|path| !moved_files.iter().any(|pair| &pair.to == path));
        deleted_files.retain(|path| !moved_files.iter().any(|pair| &pair.from == path));

        // Content of modified documents, read before taking the write lock
        let mut modified_contents = Vec::with_capacity(modified_files.len());
        for path in &modified_files {
            if cancel.is_cancelled() {
                return Err(Error::cancelled("validate_and_update"));
            }
            modified_contents.push((path.clone(), store.read(path).await?));
        }

        // Apply
        {
            let mut graph = self.index.write().await;

            for pair in &moved_files {
                graph.rename_path(&pair.from, &pair.to);
                let disk_modified = on_disk.get(&pair.to).copied().unwrap_or_default();
                if graph.timestamp(&pair.to).is_some_and(|t| disk_modified > t)
                    && let Some(content) = new_contents.get(&pair.to)
                {
                    graph.remove_document(&pair.to);
                    graph.index_document(&pair.to, content, disk_modified);
                }
                log::info!(
                    "Detected move {} -> {} (similarity {:.2})",
                    pair.from,
                    pair.to,
                    pair.score
                );
            }

            for path in &new_files {
                graph.register_document(path, on_disk[path]);
            }
            for path in &new_files {
                graph.index_document(path, &new_contents[path], on_disk[path]);
            }

            for path in &deleted_files {
                graph.remove_document(path);
            }

            for (path, content) in &modified_contents {
                graph.remove_document(path);
                graph.index_document(path, content, on_disk[path]);
            }
        }

        let report = ChangeReport {
            new_files,
            deleted_files,
            modified_files,
            moved_files,
            duration_ms: tx.elapsed_ms(),
        };

        self.index.save().await?;
        log::info!(
            "Validation applied {} changes ({} new, {} deleted, {} modified, {} moved)",
            report.total_changes(),
            report.new_files.len(),
            report.deleted_files.len(),
            report.modified_files.len(),
            report.moved_files.len()
        );
        Ok(report)
    }
}
