//! # Vault Link Maintenance
//!
//! Storage, index lifecycle and link-preserving mutations for a markdown
//! vault.
//!
//! This crate provides:
//! - A document store abstraction with a filesystem implementation
//! - The link index: full build, incremental update, persistence
//! - Consistency validation with move detection
//! - Link rewriting and link-preserving document moves
//! - Broken link repair
//! - Checkpoints for multi-document operations
//!
//! ## Quick Start
//!
//! ```no_run
//! use vaultlink_vault::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let config = EngineConfig::builder("/path/to/vault").build()?;
//! let index = Arc::new(LinkIndex::with_fs_store(config));
//! index.load_or_build(&Default::default()).await?;
//!
//! // Pick up edits made while the engine was not running
//! let changes = ConsistencyValidator::new(index.clone())
//!     .validate_and_update()
//!     .await?;
//! println!("{} changes", changes.total_changes());
//!
//! // Move a note and keep every link to it working
//! let mover = DocumentMover::new(index.clone());
//! let old = DocPath::new("inbox/Idea.md")?;
//! let new = DocPath::new("projects/Idea.md")?;
//! let result = mover.move_document(&old, &new, MoveOptions::default()).await?;
//! println!("{} links updated", result.links_updated);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! ### Index
//!
//! [`index::LinkIndex`] owns the graph behind a `tokio::sync::RwLock`. Each
//! operation takes the lock for its mutation phase; full rebuilds are
//! guarded against re-entry and can be cancelled.
//!
//! ### Validator
//!
//! [`validator::ConsistencyValidator`] reconciles the index with the store.
//! Documents that disappeared and reappeared elsewhere with the same links
//! are relabelled in place rather than dropped and re-added.
//!
//! ### Mover
//!
//! [`mover::DocumentMover`] renames a document and rewrites every reference
//! to it. A dry run returns line-diff previews without touching anything.
//!
//! ## Error Handling
//!
//! All operations return [`vaultlink_core::Result<T>`]. Validation failures
//! are reported before any side effect; use [`Error::is_validation`] to
//! tell them apart.

pub mod checkpoint;
pub mod index;
pub mod mover;
pub mod repair;
pub mod rewrite;
pub mod store;
pub mod validator;

pub use checkpoint::{CheckpointService, CheckpointToken, SnapshotCheckpoints};
pub use index::{BuildReport, LinkIndex};
pub use mover::{DocumentMover, MoveOptions, MovePreview, MoveResult};
pub use repair::{AcceptAll, FixApprover, LinkRepairer, RepairReport};
pub use rewrite::{
    BareNames, RewriteOutcome, rebase_relative_links, update_links_in_content, update_links_with,
};
pub use store::{DocumentStore, FsDocumentStore};
pub use validator::{ChangeReport, ConsistencyValidator};
pub use vaultlink_core::prelude::*;

pub mod prelude {
    pub use crate::checkpoint::*;
    pub use crate::index::*;
    pub use crate::mover::*;
    pub use crate::repair::*;
    pub use crate::rewrite::*;
    pub use crate::store::*;
    pub use crate::validator::*;
    pub use vaultlink_core::prelude::*;
}
