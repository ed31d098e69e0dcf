//! # Vaultlink Parser
//!
//! Extracts typed link references from markdown vault documents.
//!
//! Recognised syntaxes:
//! - Bracket references: `[[Note]]`, `[[Note#Heading]]`, `[[Note|Shown]]`
//! - Embeds: `![[Note]]`
//! - Path references: `[Shown](folder/Note.md)`, `[Shown](<My Note.md#Intro>)`
//!
//! References inside fenced code blocks and inline code are ignored.
//! Malformed or unbalanced brackets are skipped silently.
//!
//! ## Quick Start
//!
//! ```
//! use vaultlink_core::DocPath;
//! use vaultlink_parser::{extract_aliases, extract_links};
//!
//! let content = "---\naliases: [Home]\n---\n[[Inbox]] and ![[Diagram]]";
//! let source = DocPath::new("Index.md").unwrap();
//!
//! let links = extract_links(content, &source);
//! assert_eq!(links.len(), 2);
//! assert_eq!(extract_aliases(content), vec!["Home"]);
//! ```
//!
//! For positional rewriting use [`scan_references`], which exposes the byte
//! span of every reference along with a renderer that keeps its decorations.

pub mod parsers;

pub use parsers::frontmatter_parser::{extract_aliases, extract_frontmatter};
pub use parsers::link_utils::{
    decode_path, resolve_bracket_target, resolve_path_target, split_anchor,
};
pub use parsers::{RawReference, extract_links, scan_references};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{RawReference, extract_aliases, extract_links, scan_references};
}
