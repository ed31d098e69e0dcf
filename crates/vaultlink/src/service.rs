//! Outward operations over one vault.

use crate::outcome::OperationOutcome;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vaultlink_batch::{BatchCoordinator, BatchMoveResult, MoveRequest};
use vaultlink_core::prelude::*;
use vaultlink_graph::{BrokenLink, GraphStats};
use vaultlink_vault::{
    BuildReport, ChangeReport, CheckpointService, ConsistencyValidator, DocumentMover,
    FixApprover, LinkIndex, LinkRepairer, MoveOptions, MoveResult, RepairReport,
    SnapshotCheckpoints,
};

/// Build an outcome from an operation's result
fn finish<T>(
    operation: &str,
    tx: &TransactionBuilder,
    result: Result<T>,
    annotate: impl FnOnce(OperationOutcome<T>) -> OperationOutcome<T>,
) -> OperationOutcome<T> {
    let outcome = match result {
        Ok(data) => OperationOutcome::success(operation, data),
        Err(e) => {
            log::warn!("{} failed: {}", operation, e);
            return OperationOutcome::failure(operation, &e).with_duration(tx.elapsed_ms());
        }
    };
    annotate(outcome).with_duration(tx.elapsed_ms())
}

/// The engine's entry point: one link index plus the components that keep
/// it and the vault consistent.
///
/// Lifecycle: [`LinkService::open`] loads the persisted index (or builds
/// one) and reconciles it with the vault; operations run against the live
/// index; [`LinkService::shutdown`] persists it.
pub struct LinkService {
    index: Arc<LinkIndex>,
    validator: ConsistencyValidator,
    mover: DocumentMover,
    repairer: LinkRepairer,
    batch: BatchCoordinator,
}

impl LinkService {
    /// Open the vault described by `config`
    #[instrument(skip(config), fields(vault = ?config.vault_path), name = "service_open")]
    pub async fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let checkpoints = Arc::new(SnapshotCheckpoints::new(&config));
        let index = Arc::new(LinkIndex::with_fs_store(config));
        let service = Self::with_parts(index, checkpoints);

        let cancel = CancellationToken::new();
        if service.index.load_or_build(&cancel).await? {
            let changes = service
                .validator
                .validate_and_update_cancellable(&cancel)
                .await?;
            if !changes.is_empty() {
                log::info!("Reconciled {} changes since last run", changes.total_changes());
            }
        }
        Ok(service)
    }

    /// Assemble a service from an existing index and checkpoint service
    pub fn with_parts(index: Arc<LinkIndex>, checkpoints: Arc<dyn CheckpointService>) -> Self {
        Self {
            validator: ConsistencyValidator::new(index.clone()),
            mover: DocumentMover::new(index.clone()),
            repairer: LinkRepairer::new(index.clone()),
            batch: BatchCoordinator::new(index.clone(), checkpoints),
            index,
        }
    }

    /// The live link index
    pub fn index(&self) -> &Arc<LinkIndex> {
        &self.index
    }

    /// Persist the index
    pub async fn shutdown(&self) -> Result<()> {
        self.index.save().await
    }

    /// Move a document, rewriting references to it
    pub async fn move_document(
        &self,
        old: &str,
        new: &str,
        options: MoveOptions,
    ) -> OperationOutcome<MoveResult> {
        let tx = TransactionBuilder::new();
        let result = async {
            let old = DocPath::new(old)?;
            let new = DocPath::new(new)?;
            self.mover.move_document(&old, &new, options).await
        }
        .await;

        finish("move_document", &tx, result, |outcome| {
            let Some(data) = outcome.data.as_ref() else {
                return outcome;
            };
            let touched: Vec<DocPath> = [data.old_path.clone(), data.new_path.clone()]
                .into_iter()
                .chain(data.previews.iter().map(|p| p.path.clone()))
                .collect();
            let (files, links) = if data.dry_run {
                (
                    data.previews.len(),
                    data.previews.iter().map(|p| p.occurrences).sum(),
                )
            } else {
                (data.files_updated, data.links_updated)
            };
            outcome
                .with_affected(touched)
                .with_count("files_updated", files)
                .with_count("links_updated", links)
        })
    }

    /// Move several documents as one all-or-nothing transaction
    pub async fn batch_move(
        &self,
        moves: &[MoveRequest],
        options: MoveOptions,
        cancel: &CancellationToken,
    ) -> OperationOutcome<BatchMoveResult> {
        let tx = TransactionBuilder::new();
        let result = self.batch.batch_move(moves, options, cancel).await;

        finish("batch_move", &tx, result, |outcome| {
            let Some(data) = outcome.data.as_ref() else {
                return outcome;
            };
            let touched: Vec<DocPath> = data
                .records
                .iter()
                .flat_map(|r| [r.from.clone(), r.to.clone()])
                .collect();
            let (moved, links, files) = (
                data.moved_count,
                data.total_links_updated,
                data.files_touched,
            );
            outcome
                .with_affected(touched)
                .with_count("moved", moved)
                .with_count("links_updated", links)
                .with_count("files_touched", files)
        })
    }

    /// Every broken link with its repair suggestion
    pub async fn find_broken_links(&self) -> OperationOutcome<Vec<BrokenLink>> {
        let tx = TransactionBuilder::new();
        let broken = self.repairer.find_broken_links().await;

        finish("find_broken_links", &tx, Ok(broken), |outcome| {
            let sources: Vec<DocPath> = outcome
                .data
                .iter()
                .flatten()
                .map(|b| b.source.clone())
                .collect();
            let (count, with_suggestion) = outcome.data.as_ref().map_or((0, 0), |b| {
                (b.len(), b.iter().filter(|l| l.suggestion.is_some()).count())
            });
            outcome
                .with_affected(sources)
                .with_count("broken", count)
                .with_count("with_suggestion", with_suggestion)
        })
    }

    /// Report broken links and apply the suggestions `approver` accepts
    pub async fn check_and_fix_broken_links(
        &self,
        fix: bool,
        approver: &dyn FixApprover,
    ) -> OperationOutcome<RepairReport> {
        let tx = TransactionBuilder::new();
        let result = self.repairer.check_and_fix_broken_links(fix, approver).await;

        finish("check_and_fix_broken_links", &tx, result, |outcome| {
            let Some(data) = outcome.data.as_ref() else {
                return outcome;
            };
            let modified = data.files_modified.clone();
            let (broken, fixed, skipped) = (data.broken, data.fixed, data.skipped);
            outcome
                .with_affected(modified)
                .with_count("broken", broken)
                .with_count("fixed", fixed)
                .with_count("skipped", skipped)
        })
    }

    /// Documents linking to `path`, sorted
    pub async fn get_backlinks(&self, path: &str) -> OperationOutcome<Vec<DocPath>> {
        let tx = TransactionBuilder::new();
        let result = match DocPath::new(path) {
            Ok(path) => Ok((self.index.backlinks(&path).await, path)),
            Err(e) => Err(e),
        };
        Self::link_query("get_backlinks", &tx, result)
    }

    /// Documents `path` links to, sorted
    pub async fn get_forward_links(&self, path: &str) -> OperationOutcome<Vec<DocPath>> {
        let tx = TransactionBuilder::new();
        let result = match DocPath::new(path) {
            Ok(path) => Ok((self.index.forward_links(&path).await, path)),
            Err(e) => Err(e),
        };
        Self::link_query("get_forward_links", &tx, result)
    }

    fn link_query(
        operation: &str,
        tx: &TransactionBuilder,
        result: Result<(Vec<DocPath>, DocPath)>,
    ) -> OperationOutcome<Vec<DocPath>> {
        match result {
            Ok((links, path)) => {
                let count = links.len();
                finish(operation, tx, Ok(links), |outcome| {
                    outcome.with_affected([path]).with_count("links", count)
                })
            }
            Err(e) => finish(operation, tx, Err(e), |outcome| outcome),
        }
    }

    /// Rebuild the whole index from the vault
    pub async fn rebuild_index(&self) -> OperationOutcome<BuildReport> {
        let tx = TransactionBuilder::new();
        let result = self.index.build_index().await;

        finish("rebuild_index", &tx, result, |outcome| {
            let Some(data) = outcome.data.as_ref() else {
                return outcome;
            };
            let (documents, links) = (data.documents, data.links);
            outcome
                .with_count("documents", documents)
                .with_count("links", links)
        })
    }

    /// Reconcile the index with the vault
    pub async fn validate_and_update(&self) -> OperationOutcome<ChangeReport> {
        let tx = TransactionBuilder::new();
        let result = self.validator.validate_and_update().await;

        finish("validate_and_update", &tx, result, |outcome| {
            let Some(data) = outcome.data.as_ref() else {
                return outcome;
            };
            let touched: Vec<DocPath> = data
                .new_files
                .iter()
                .chain(&data.deleted_files)
                .chain(&data.modified_files)
                .cloned()
                .chain(data.moved_files.iter().map(|m| m.to.clone()))
                .collect();
            let counts = [
                ("new", data.new_files.len()),
                ("deleted", data.deleted_files.len()),
                ("modified", data.modified_files.len()),
                ("moved", data.moved_files.len()),
            ];
            counts
                .into_iter()
                .fold(outcome.with_affected(touched), |outcome, (name, value)| {
                    outcome.with_count(name, value)
                })
        })
    }

    /// Graph statistics
    pub async fn stats(&self) -> GraphStats {
        self.index.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vaultlink_vault::AcceptAll;

    async fn create_service(files: &[(&str, &str)]) -> (LinkService, TempDir, TempDir) {
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
        (LinkService::open(config).await.unwrap(), vault, backups)
    }

    #[tokio::test]
    async fn test_open_builds_then_loads() {
        let (service, vault, _backups) =
            create_service(&[("A.md", "[[B]]"), ("B.md", "")]).await;
        assert!(vault.path().join(".vaultlink/link-index.json").exists());
        service.shutdown().await.unwrap();

        let reopened = LinkService::open(EngineConfig::for_vault(vault.path()))
            .await
            .unwrap();
        let backlinks = reopened.get_backlinks("B.md").await;
        assert!(backlinks.success);
        assert_eq!(backlinks.data.unwrap(), vec![DocPath::new("A.md").unwrap()]);
    }

    #[tokio::test]
    async fn test_move_outcome_counts() {
        let (service, _vault, _backups) =
            create_service(&[("A.md", "[[B]] [[B|b]]"), ("B.md", "")]).await;

        let outcome = service
            .move_document("B.md", "C.md", MoveOptions::default())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.count("links_updated"), 2);
        assert_eq!(outcome.count("files_updated"), 1);
        assert!(outcome.affected_paths.contains(&DocPath::new("A.md").unwrap()));
    }

    #[tokio::test]
    async fn test_failures_become_outcomes() {
        let (service, _vault, _backups) = create_service(&[("A.md", "")]).await;

        let outcome = service
            .move_document("Missing.md", "X.md", MoveOptions::default())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "validation_error");

        let outcome = service.get_backlinks("../outside.md").await;
        assert!(!outcome.success);
        assert!(outcome.data.is_none());
    }

    #[tokio::test]
    async fn test_repair_outcome() {
        let (service, _vault, _backups) =
            create_service(&[("Daily.md", "[[Projcet Plan]]"), ("Project Plan.md", "")]).await;

        let broken = service.find_broken_links().await;
        assert_eq!(broken.count("broken"), 1);
        assert_eq!(broken.count("with_suggestion"), 1);

        let repaired = service.check_and_fix_broken_links(true, &AcceptAll).await;
        assert_eq!(repaired.count("fixed"), 1);
        assert_eq!(repaired.affected_paths, vec![DocPath::new("Daily.md").unwrap()]);
        assert_eq!(service.find_broken_links().await.count("broken"), 0);
    }
}
