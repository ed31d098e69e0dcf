//! # Batch Moves
//!
//! Moves several documents as one all-or-nothing transaction. Every move in
//! a batch either takes effect with its link rewrites, or the vault and the
//! index end up exactly as they were before the batch started.
//!
//! 1. The whole batch is validated up front; problems are reported together.
//! 2. A checkpoint of the vault and a snapshot of the graph are taken.
//! 3. Moves run strictly in caller order.
//! 4. On any failure the checkpoint is rolled back and the graph restored.
//! 5. On success the index is rebuilt from scratch and the checkpoint released.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vaultlink_core::prelude::*;
use vaultlink_vault::{
    CheckpointService, DocumentMover, LinkIndex, MoveOptions, MovePreview, SnapshotCheckpoints,
};

/// One move in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: DocPath,
    pub to: DocPath,
}

impl MoveRequest {
    /// Create a move request from two vault-relative paths
    pub fn new(from: impl AsRef<str>, to: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            from: DocPath::new(from)?,
            to: DocPath::new(to)?,
        })
    }
}

/// Record of a single move within a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Index in the batch
    pub operation_index: usize,
    pub from: DocPath,
    pub to: DocPath,
    pub files_updated: usize,
    pub links_updated: usize,
    /// Prospective rewrites (dry run) or the rewrites applied
    pub previews: Vec<MovePreview>,
}

/// Result of a batch move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMoveResult {
    pub dry_run: bool,
    /// Moves carried out (zero for a dry run)
    pub moved_count: usize,
    /// Link occurrences rewritten, or that would be
    pub total_links_updated: usize,
    /// Distinct documents rewritten, or that would be
    pub files_touched: usize,
    pub records: Vec<MoveRecord>,
    /// Unique transaction ID
    pub transaction_id: String,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

/// Runs batch moves against one link index
pub struct BatchCoordinator {
    index: Arc<LinkIndex>,
    checkpoints: Arc<dyn CheckpointService>,
}

impl BatchCoordinator {
    /// Create a coordinator using `checkpoints` for rollback
    pub fn new(index: Arc<LinkIndex>, checkpoints: Arc<dyn CheckpointService>) -> Self {
        Self { index, checkpoints }
    }

    /// Create a coordinator with file-copy checkpoints for the index's vault
    pub fn with_snapshots(index: Arc<LinkIndex>) -> Self {
        let checkpoints = Arc::new(SnapshotCheckpoints::new(index.config()));
        Self::new(index, checkpoints)
    }

    /// Validate the whole batch before anything runs.
    ///
    /// Sources and targets are tracked in order, so a source may be a
    /// document created by an earlier move and a target may be a path an
    /// earlier move vacated.
    pub async fn validate(&self, moves: &[MoveRequest]) -> Result<()> {
        if moves.is_empty() {
            return Err(Error::batch_validation(vec![
                "Batch cannot be empty".to_string(),
            ]));
        }

        let store = self.index.store();
        let mut present: BTreeSet<DocPath> = store
            .list_documents()
            .await?
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        let mut vacated = BTreeSet::new();
        let mut targets = BTreeSet::new();
        let mut errors = Vec::new();

        for (i, request) in moves.iter().enumerate() {
            let MoveRequest { from, to } = request;

            if from == to {
                errors.push(format!("Move {}: source and target are the same ({})", i, from));
                continue;
            }
            if !to.is_document() {
                errors.push(format!("Move {}: target is not a document ({})", i, to));
            }
            let duplicate = !targets.insert(to.clone());
            if duplicate {
                errors.push(format!("Move {}: duplicate target {}", i, to));
            }

            if present.remove(from) {
                vacated.insert(from.clone());
            } else {
                errors.push(format!("Move {}: source does not exist ({})", i, from));
            }
            if duplicate {
                continue;
            }

            let occupied = present.contains(to)
                || (!vacated.contains(to) && store.exists(to).await?);
            if occupied {
                errors.push(format!("Move {}: target already exists ({})", i, to));
            } else {
                vacated.remove(to);
                present.insert(to.clone());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::batch_validation(errors))
        }
    }

    /// Move every document in `moves`, in order, as one transaction.
    #[instrument(skip(self, moves, cancel), fields(moves = moves.len()), name = "batch_move")]
    pub async fn batch_move(
        &self,
        moves: &[MoveRequest],
        options: MoveOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchMoveResult> {
        let transaction = TransactionBuilder::new();
        self.validate(moves).await?;

        let mover = DocumentMover::new(self.index.clone());
        if options.dry_run {
            return self.dry_run(&mover, moves, &transaction).await;
        }

        let token = self.checkpoints.create_checkpoint().await?;
        let snapshot = self.index.snapshot().await;
        log::info!(
            "Batch {}: {} moves, checkpoint {}",
            transaction.transaction_id(),
            moves.len(),
            token.id
        );

        let records = match self.execute(&mover, moves, options, cancel).await {
            Ok(records) => records,
            Err(e) => {
                log::warn!(
                    "Batch {} failed, rolling back: {}",
                    transaction.transaction_id(),
                    e
                );
                match self.checkpoints.rollback_to(&token).await {
                    Ok(()) => {
                        if let Err(discard_err) = self.checkpoints.discard(&token).await {
                            log::warn!("Failed to discard checkpoint {}: {}", token.id, discard_err);
                        }
                    }
                    // Keep the checkpoint for manual recovery
                    Err(rollback_err) => log::error!(
                        "Rollback of batch {} to checkpoint {} failed: {}",
                        transaction.transaction_id(),
                        token.id,
                        rollback_err
                    ),
                }
                self.index.restore(snapshot).await;
                if let Err(save_err) = self.index.save().await {
                    log::warn!("Failed to persist restored index: {}", save_err);
                }
                return Err(e);
            }
        };

        // Every move already re-indexed what it touched
        if let Err(e) = self.index.build_index().await {
            log::warn!(
                "Batch {}: rebuild after commit failed, keeping incremental index: {}",
                transaction.transaction_id(),
                e
            );
        }
        if let Err(e) = self.checkpoints.discard(&token).await {
            log::warn!("Failed to discard checkpoint {}: {}", token.id, e);
        }

        let result = summarize(false, records, &transaction);
        log::info!(
            "Batch {} complete: {} moves, {} links in {} documents ({}ms)",
            result.transaction_id,
            result.moved_count,
            result.total_links_updated,
            result.files_touched,
            result.duration_ms
        );
        Ok(result)
    }

    async fn execute(
        &self,
        mover: &DocumentMover,
        moves: &[MoveRequest],
        options: MoveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<MoveRecord>> {
        let options = MoveOptions {
            dry_run: false,
            ..options
        };
        let mut records = Vec::with_capacity(moves.len());

        for (operation_index, request) in moves.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::cancelled("batch_move"));
            }

            let result = mover
                .move_document(&request.from, &request.to, options)
                .await?;
            records.push(MoveRecord {
                operation_index,
                from: request.from.clone(),
                to: request.to.clone(),
                files_updated: result.files_updated,
                links_updated: result.links_updated,
                previews: result.previews,
            });
        }

        Ok(records)
    }

    /// Previews against the current index. Sources that only exist once an
    /// earlier move has run have none.
    async fn dry_run(
        &self,
        mover: &DocumentMover,
        moves: &[MoveRequest],
        transaction: &TransactionBuilder,
    ) -> Result<BatchMoveResult> {
        let store = self.index.store();
        let mut records = Vec::with_capacity(moves.len());

        for (operation_index, request) in moves.iter().enumerate() {
            let previews = if store.exists(&request.from).await? {
                mover.preview(&request.from, &request.to).await?
            } else {
                Vec::new()
            };
            records.push(MoveRecord {
                operation_index,
                from: request.from.clone(),
                to: request.to.clone(),
                files_updated: previews.len(),
                links_updated: previews.iter().map(|p| p.occurrences).sum(),
                previews,
            });
        }

        Ok(summarize(true, records, transaction))
    }
}

fn summarize(dry_run: bool, records: Vec<MoveRecord>, transaction: &TransactionBuilder) -> BatchMoveResult {
    let files_touched = records
        .iter()
        .flat_map(|r| r.previews.iter().map(|p| &p.path))
        .collect::<BTreeSet<_>>()
        .len();

    BatchMoveResult {
        dry_run,
        moved_count: if dry_run { 0 } else { records.len() },
        total_links_updated: records.iter().map(|r| r.links_updated).sum(),
        files_touched,
        records,
        transaction_id: transaction.transaction_id().to_string(),
        duration_ms: transaction.elapsed_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use vaultlink_vault::{DocumentStore, FsDocumentStore};

    /// Filesystem store that refuses to move one particular document
    struct FailingStore {
        inner: FsDocumentStore,
        fail_on: DocPath,
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn list_documents(&self) -> Result<Vec<DocumentEntry>> {
            self.inner.list_documents().await
        }
        async fn read(&self, path: &DocPath) -> Result<String> {
            self.inner.read(path).await
        }
        async fn write(&self, path: &DocPath, content: &str) -> Result<()> {
            self.inner.write(path, content).await
        }
        async fn rename(&self, from: &DocPath, to: &DocPath) -> Result<()> {
            if from == &self.fail_on {
                return Err(Error::io(std::io::Error::other("disk full")));
            }
            self.inner.rename(from, to).await
        }
        async fn delete(&self, path: &DocPath) -> Result<()> {
            self.inner.delete(path).await
        }
        async fn exists(&self, path: &DocPath) -> Result<bool> {
            self.inner.exists(path).await
        }
        async fn modified(&self, path: &DocPath) -> Result<f64> {
            self.inner.modified(path).await
        }
    }

    /// Filesystem store that stops listing after `listings` successful calls
    struct ListingLimitedStore {
        inner: FsDocumentStore,
        listings: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for ListingLimitedStore {
        async fn list_documents(&self) -> Result<Vec<DocumentEntry>> {
            let remaining = self.listings.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(Error::io(std::io::Error::other("vault unmounted")));
            }
            self.listings.store(remaining - 1, Ordering::SeqCst);
            self.inner.list_documents().await
        }
        async fn read(&self, path: &DocPath) -> Result<String> {
            self.inner.read(path).await
        }
        async fn write(&self, path: &DocPath, content: &str) -> Result<()> {
            self.inner.write(path, content).await
        }
        async fn rename(&self, from: &DocPath, to: &DocPath) -> Result<()> {
            self.inner.rename(from, to).await
        }
        async fn delete(&self, path: &DocPath) -> Result<()> {
            self.inner.delete(path).await
        }
        async fn exists(&self, path: &DocPath) -> Result<bool> {
            self.inner.exists(path).await
        }
        async fn modified(&self, path: &DocPath) -> Result<f64> {
            self.inner.modified(path).await
        }
    }

    struct Fixture {
        vault: TempDir,
        _backups: TempDir,
        index: Arc<LinkIndex>,
        coordinator: BatchCoordinator,
    }

    async fn create_fixture(files: &[(&str, &str)], fail_on: Option<&str>) -> Fixture {
        let vault = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        for (path, content) in files {
            let full = vault.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }

        let config = EngineConfig::builder(vault.path())
            .checkpoint_dir(backups.path())
            .build()
            .unwrap();
        let index = match fail_on {
            Some(path) => {
                let store = Arc::new(FailingStore {
                    inner: FsDocumentStore::new(&config),
                    fail_on: DocPath::new(path).unwrap(),
                });
                Arc::new(LinkIndex::new(config, store))
            }
            None => Arc::new(LinkIndex::with_fs_store(config)),
        };
        index.build_index().await.unwrap();
        let coordinator = BatchCoordinator::with_snapshots(index.clone());

        Fixture {
            vault,
            _backups: backups,
            index,
            coordinator,
        }
    }

    /// Every file under the vault except the persisted index
    fn vault_files(root: &Path) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        for entry in list_files(root) {
            let relative = entry.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            if !relative.starts_with(".vaultlink") {
                files.insert(relative, std::fs::read_to_string(&entry).unwrap());
            }
        }
        files
    }

    fn list_files(dir: &Path) -> Vec<std::path::PathBuf> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.extend(list_files(&path));
            } else {
                out.push(path);
            }
        }
        out
    }

    fn moves(pairs: &[(&str, &str)]) -> Vec<MoveRequest> {
        pairs
            .iter()
            .map(|(from, to)| MoveRequest::new(from, to).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_failure_rolls_back_everything() {
        let fixture = create_fixture(
            &[
                ("A.md", "[[B]] [[C]]"),
                ("B.md", "[[D]]"),
                ("C.md", "plain"),
                ("D.md", "[c](C.md)"),
            ],
            Some("C.md"),
        )
        .await;
        let files_before = vault_files(fixture.vault.path());
        let graph_before = fixture.index.snapshot().await;

        let err = fixture
            .coordinator
            .batch_move(
                &moves(&[("B.md", "x/B2.md"), ("C.md", "C2.md"), ("D.md", "D2.md")]),
                MoveOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(vault_files(fixture.vault.path()), files_before);
        assert!(!fixture.vault.path().join("x").exists());
        assert_eq!(fixture.index.snapshot().await, graph_before);
    }

    #[tokio::test]
    async fn test_successful_batch_swaps_documents() {
        let fixture = create_fixture(
            &[("A.md", "[[B]]"), ("B.md", "[[A]]"), ("C.md", "[[A]] [[B]]")],
            None,
        )
        .await;

        let result = fixture
            .coordinator
            .batch_move(
                &moves(&[("A.md", "Tmp.md"), ("B.md", "A.md"), ("Tmp.md", "B.md")]),
                MoveOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.moved_count, 3);
        assert!(!result.dry_run);
        let files = vault_files(fixture.vault.path());
        assert_eq!(files["A.md"], "[[B]]");
        assert_eq!(files["B.md"], "[[A]]");
        assert_eq!(files["C.md"], "[[B]] [[A]]");
        assert!(!files.contains_key("Tmp.md"));

        let graph = fixture.index.read().await;
        assert!(graph.verify_consistency().is_empty());
        assert_eq!(graph.document_count(), 3);
    }

    #[tokio::test]
    async fn test_validation_is_aggregated() {
        let fixture = create_fixture(
            &[("A.md", ""), ("B.md", ""), ("C.md", ""), ("E.md", "")],
            None,
        )
        .await;
        let files_before = vault_files(fixture.vault.path());

        let err = fixture
            .coordinator
            .batch_move(
                &moves(&[
                    ("A.md", "B.md"),
                    ("Missing.md", "Z.md"),
                    ("C.md", "Y.md"),
                    ("E.md", "Y.md"),
                ]),
                MoveOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            Error::BatchValidation { errors } => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(vault_files(fixture.vault.path()), files_before);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let fixture = create_fixture(&[("A.md", "")], None).await;
        let err = fixture
            .coordinator
            .batch_move(&[], MoveOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_dry_run_reports_totals() {
        let fixture = create_fixture(
            &[("A.md", "[[B]] [[C]]"), ("B.md", ""), ("C.md", "[[B]]")],
            None,
        )
        .await;
        let files_before = vault_files(fixture.vault.path());

        let result = fixture
            .coordinator
            .batch_move(
                &moves(&[("B.md", "B2.md"), ("C.md", "C2.md")]),
                MoveOptions::dry_run(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.dry_run);
        assert_eq!(result.moved_count, 0);
        assert_eq!(result.total_links_updated, 3);
        assert_eq!(result.files_touched, 2);
        assert_eq!(vault_files(fixture.vault.path()), files_before);
    }

    #[tokio::test]
    async fn test_cancelled_batch_rolls_back() {
        let fixture = create_fixture(&[("A.md", "[[B]]"), ("B.md", "")], None).await;
        let files_before = vault_files(fixture.vault.path());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fixture
            .coordinator
            .batch_move(&moves(&[("B.md", "B2.md")]), MoveOptions::default(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { .. }));
        assert_eq!(vault_files(fixture.vault.path()), files_before);
    }

    #[test]
    fn test_move_request_from_json() {
        let request: MoveRequest =
            serde_json::from_str(r#"{"from": "inbox/Idea.md", "to": "projects/Idea.md"}"#).unwrap();
        assert_eq!(request, MoveRequest::new("inbox/Idea.md", "projects/Idea.md").unwrap());
    }

    #[tokio::test]
    async fn test_committed_batch_survives_failed_rebuild() {
        let vault = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        std::fs::write(vault.path().join("A.md"), "[[B]]").unwrap();
        std::fs::write(vault.path().join("B.md"), "").unwrap();
        let config = EngineConfig::builder(vault.path())
            .checkpoint_dir(backups.path())
            .build()
            .unwrap();

        // Initial build and batch validation list the vault; the rebuild cannot
        let store = Arc::new(ListingLimitedStore {
            inner: FsDocumentStore::new(&config),
            listings: AtomicUsize::new(2),
        });
        let index = Arc::new(LinkIndex::new(config, store));
        index.build_index().await.unwrap();
        let coordinator = BatchCoordinator::with_snapshots(index.clone());

        let result = coordinator
            .batch_move(
                &[MoveRequest::new("B.md", "C.md").unwrap()],
                MoveOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.moved_count, 1);
        assert_eq!(std::fs::read_to_string(vault.path().join("A.md")).unwrap(), "[[C]]");
        assert_eq!(index.backlinks(&DocPath::new("C.md").unwrap()).await.len(), 1);
        assert!(index.read().await.verify_consistency().is_empty());
        assert_eq!(std::fs::read_dir(backups.path()).unwrap().count(), 0);
    }
}
