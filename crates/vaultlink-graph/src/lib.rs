//! # Link Graph
//!
//! Bidirectional link index for markdown vaults.
//!
//! Provides:
//! - Forward links and backlinks kept as exact transposes
//! - Per-occurrence link details with source positions
//! - Alias table and name-based link resolution
//! - In-place relabelling when a document moves
//! - JSON persistence with a version tag
//! - Move detection by link fingerprint
//! - Broken link detection with repair suggestions
//!
//! ## Quick Start
//!
//! ```
//! use vaultlink_core::DocPath;
//! use vaultlink_graph::GraphStore;
//!
//! let a = DocPath::new("A.md").unwrap();
//! let b = DocPath::new("notes/B.md").unwrap();
//!
//! let mut graph = GraphStore::new();
//! graph.register_document(&a, 0.0);
//! graph.register_document(&b, 0.0);
//! graph.index_document(&a, "See [[B]] and [[B|again]]", 0.0);
//!
//! assert_eq!(graph.backlinks(&b), &[a.clone()]);
//! assert_eq!(graph.link_details(&a, &b).len(), 2);
//!
//! let moved = DocPath::new("archive/B.md").unwrap();
//! graph.rename_path(&b, &moved);
//! assert_eq!(graph.forward_links(&a), vec![moved]);
//! ```
//!
//! ### Finding Broken Links
//!
//! ```
//! use vaultlink_core::DocPath;
//! use vaultlink_graph::{BrokenLinkDetector, GraphStore};
//!
//! let mut graph = GraphStore::new();
//! let daily = DocPath::new("Daily.md").unwrap();
//! let plan = DocPath::new("Project Plan.md").unwrap();
//! graph.register_document(&plan, 0.0);
//! graph.index_document(&daily, "[[Projcet Plan]]", 0.0);
//!
//! let broken = BrokenLinkDetector::new(&graph).find_broken_links();
//! assert_eq!(broken[0].suggestion.as_ref().unwrap().path, plan);
//! ```

pub mod broken;
pub mod graph;
pub mod persist;
pub mod resolver;
pub mod similarity;

pub use broken::{BrokenLink, BrokenLinkDetector, SUGGESTION_THRESHOLD, Suggestion};
pub use graph::{GraphStats, GraphStore};
pub use persist::{INDEX_FORMAT_VERSION, IndexMetadata, LinkDetailRecord, PersistedIndex};
pub use resolver::LinkResolver;
pub use similarity::{Fingerprint, MOVE_SIMILARITY_THRESHOLD, MovePair, match_moves, similarity};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{BrokenLink, BrokenLinkDetector, Fingerprint, GraphStore, LinkResolver};
}
