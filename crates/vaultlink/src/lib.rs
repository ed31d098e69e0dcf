//! # Vaultlink
//!
//! Link-graph consistency engine for interlinked markdown vaults.
//!
//! Keeps a bidirectional link index over a vault and every link in it
//! working while documents are moved, renamed or edited:
//! - forward links and backlinks, persisted between runs
//! - reconciliation with edits made while the engine was not running,
//!   including detection of documents moved outside the engine
//! - link-preserving moves, singly or as all-or-nothing batches
//! - broken link detection and repair
//!
//! ## Quick Start
//!
//! ```no_run
//! use vaultlink::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! vaultlink::logging::init_logging("info");
//!
//! let config = EngineConfig::builder("/path/to/vault").build()?;
//! let service = LinkService::open(config).await?;
//!
//! let outcome = service
//!     .move_document("inbox/Idea.md", "projects/Idea.md", MoveOptions::default())
//!     .await;
//! println!("{} links updated", outcome.count("links_updated"));
//!
//! let backlinks = service.get_backlinks("projects/Idea.md").await;
//! println!("{:?}", backlinks.data);
//!
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The index file lives at `<vault>/.vaultlink/link-index.json` and assumes
//! a single process owns the vault at a time.

pub mod logging;
pub mod outcome;
pub mod service;

pub use outcome::{OperationError, OperationOutcome};
pub use service::LinkService;
pub use tokio_util::sync::CancellationToken;
pub use vaultlink_batch::{BatchCoordinator, BatchMoveResult, MoveRecord, MoveRequest};
pub use vaultlink_core::prelude::*;
pub use vaultlink_graph::{BrokenLink, GraphStats, Suggestion};
pub use vaultlink_vault::{
    AcceptAll, BuildReport, ChangeReport, FixApprover, MoveOptions, MovePreview, MoveResult,
    RepairReport,
};

pub mod prelude {
    pub use crate::{
        AcceptAll, BatchMoveResult, BrokenLink, CancellationToken, ChangeReport, FixApprover,
        LinkService, MoveOptions, MoveRequest, MoveResult, OperationOutcome, RepairReport,
    };
    pub use vaultlink_core::prelude::*;
}
