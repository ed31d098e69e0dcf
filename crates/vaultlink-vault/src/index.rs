//! Link index lifecycle: load, build, incremental update, save.
//!
//! [`LinkIndex`] owns the live [`GraphStore`] together with the document
//! store it was built from. Components that mutate the vault share it
//! through an `Arc`.

use crate::store::{DocumentStore, FsDocumentStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vaultlink_core::prelude::*;
use vaultlink_graph::{GraphStats, GraphStore};

/// Outcome of a full rebuild
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub documents: usize,
    pub links: usize,
    /// Another build was already running; nothing was done
    pub skipped: bool,
    pub duration_ms: u64,
}

/// Resets the build flag when a build ends, however it ends
struct BuildGuard<'a>(&'a AtomicBool);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The engine's link index for one vault
pub struct LinkIndex {
    config: Arc<EngineConfig>,
    store: Arc<dyn DocumentStore>,
    graph: RwLock<GraphStore>,
    building: AtomicBool,
    last_full_scan: RwLock<Option<DateTime<Utc>>>,
}

impl LinkIndex {
    /// Create an empty index over `store`
    pub fn new(config: EngineConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            graph: RwLock::new(GraphStore::new()),
            building: AtomicBool::new(false),
            last_full_scan: RwLock::new(None),
        }
    }

    /// Create an empty index over the vault directory in `config`
    pub fn with_fs_store(config: EngineConfig) -> Self {
        let store = Arc::new(FsDocumentStore::new(&config));
        Self::new(config, store)
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Backing document store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Shared read access to the graph
    pub async fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.graph.read().await
    }

    /// Exclusive access to the graph for a mutation phase
    pub async fn write(&self) -> RwLockWriteGuard<'_, GraphStore> {
        self.graph.write().await
    }

    /// Copy of the current graph
    pub async fn snapshot(&self) -> GraphStore {
        self.graph.read().await.clone()
    }

    /// Replace the live graph, e.g. with a snapshot taken earlier
    pub async fn restore(&self, graph: GraphStore) {
        *self.graph.write().await = graph;
    }

    /// When the last full build finished
    pub async fn last_full_scan(&self) -> Option<DateTime<Utc>> {
        *self.last_full_scan.read().await
    }

    /// Load the persisted index. Returns whether one was found and usable.
    #[instrument(skip(self), name = "index_load")]
    pub async fn load(&self) -> bool {
        let path = self.config.index_path();
        match GraphStore::load(&path).await {
            Some((graph, meta)) => {
                log::info!(
                    "Loaded link index from {} ({} documents)",
                    path.display(),
                    graph.document_count()
                );
                *self.graph.write().await = graph;
                *self.last_full_scan.write().await = meta.last_full_scan;
                true
            }
            None => false,
        }
    }

    /// Persist the index
    pub async fn save(&self) -> Result<()> {
        let last_full_scan = *self.last_full_scan.read().await;
        let graph = self.graph.read().await;
        graph.save(&self.config.index_path(), last_full_scan).await
    }

    /// Persist the index if configured to do so after mutations
    pub async fn save_after_mutation(&self) -> Result<()> {
        if self.config.save_after_mutation {
            self.save().await
        } else {
            Ok(())
        }
    }

    /// Load the persisted index, or build one when none is usable.
    ///
    /// Returns whether an existing index was loaded.
    pub async fn load_or_build(&self, cancel: &CancellationToken) -> Result<bool> {
        if self.load().await {
            return Ok(true);
        }
        log::info!("No usable link index, building from scratch");
        self.build_index_cancellable(cancel).await?;
        Ok(false)
    }

    /// Rebuild the whole index from the document store
    pub async fn build_index(&self) -> Result<BuildReport> {
        self.build_index_cancellable(&CancellationToken::new()).await
    }

    /// Rebuild the whole index, checking `cancel` between documents.
    ///
    /// The new graph is built separately and swapped in when complete, so a
    /// cancelled or failed build leaves the previous graph untouched. A build
    /// requested while another is running is skipped.
    #[instrument(skip(self, cancel), name = "index_build")]
    pub async fn build_index_cancellable(&self, cancel: &CancellationToken) -> Result<BuildReport> {
        if self
            .building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Index build already running, skipping");
            return Ok(BuildReport {
                skipped: true,
                ..BuildReport::default()
            });
        }
        let _guard = BuildGuard(&self.building);
        let tx = TransactionBuilder::new();

        let documents = self.store.list_documents().await?;
        log::info!("Building link index over {} documents", documents.len());

        let mut graph = GraphStore::new();
        for entry in &documents {
            graph.register_document(&entry.path, entry.modified);
        }

        let mut links = 0;
        for entry in &documents {
            if cancel.is_cancelled() {
                return Err(Error::cancelled("build_index"));
            }
            match self.store.read(&entry.path).await {
                Ok(content) => {
                    links += graph.index_document(&entry.path, &content, entry.modified);
                }
                Err(e) => {
                    log::warn!("Failed to read {}: {}", entry.path, e);
                    graph.index_document(&entry.path, "", entry.modified);
                }
            }
        }

        let violations = graph.verify_consistency();
        if !violations.is_empty() {
            log::warn!("Index built with {} inconsistencies", violations.len());
        }

        *self.graph.write().await = graph;
        *self.last_full_scan.write().await = Some(Utc::now());
        self.save().await?;

        let report = BuildReport {
            documents: documents.len(),
            links,
            skipped: false,
            duration_ms: tx.elapsed_ms(),
        };
        log::info!(
            "Link index built: {} documents, {} links in {}ms",
            report.documents,
            report.links,
            report.duration_ms
        );
        Ok(report)
    }

    /// Re-index one document from its current content.
    ///
    /// A document that no longer exists is removed instead. Returns the
    /// number of link occurrences indexed.
    #[instrument(skip(self), fields(file = %path), name = "index_update_file")]
    pub async fn update_file_links(&self, path: &DocPath) -> Result<usize> {
        let content = match self.store.read(path).await {
            Ok(content) => content,
            Err(Error::DocumentNotFound { .. }) => {
                self.graph.write().await.remove_document(path);
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        let modified = self.store.modified(path).await?;

        let mut graph = self.graph.write().await;
        graph.remove_document(path);
        Ok(graph.index_document(path, &content, modified))
    }

    /// Documents linking to `path`, sorted
    pub async fn backlinks(&self, path: &DocPath) -> Vec<DocPath> {
        let mut sources = self.graph.read().await.backlinks(path).to_vec();
        sources.sort();
        sources
    }

    /// Documents `path` links to, sorted
    pub async fn forward_links(&self, path: &DocPath) -> Vec<DocPath> {
        self.graph.read().await.forward_links(path)
    }

    /// Graph statistics
    pub async fn stats(&self) -> GraphStats {
        self.graph.read().await.stats()
    }
}
