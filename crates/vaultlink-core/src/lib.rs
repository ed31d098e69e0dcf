//! # Vaultlink Core
//!
//! Core data models, error types, and configuration for the link-graph
//! consistency engine. This crate defines the canonical types that all other
//! crates depend on.
//!
//! ## Architecture Principles
//!
//! - **Type-Driven Design**: [`DocPath`] and [`LinkKind`] replace string-based APIs
//! - **Zero Panic in Libraries**: All errors are `Result<T, Error>`
//! - **Builder Pattern for Configuration**: [`EngineConfig::builder`]
//!
//! ## Core Modules
//!
//! - [`models`] - Document paths, links, source positions
//! - [`error`] - Error taxonomy and Result alias
//! - [`config`] - Engine configuration
//! - [`utils`] - Transaction tracking and timestamps
//!
//! ## Usage Examples
//!
//! ```
//! use vaultlink_core::prelude::*;
//!
//! let path = DocPath::new("projects/Plan.md")?;
//! assert_eq!(path.stem(), "Plan");
//!
//! let err = Error::validation_error("target already exists");
//! assert!(err.is_validation());
//! # Ok::<(), Error>(())
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use config::*;
pub use error::{Error, Result};
pub use models::*;
pub use utils::{TransactionBuilder, now_secs, system_time_to_secs};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::models::{
        DOCUMENT_EXTENSION, DocPath, DocumentEntry, LineIndex, Link, LinkKind, SourcePosition,
    };
    pub use crate::utils::TransactionBuilder;
}
