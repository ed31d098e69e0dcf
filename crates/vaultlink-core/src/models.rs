//! Core data models for the link graph.
//!
//! These types are designed to be:
//! - **Serializable**: All types derive Serialize/Deserialize
//! - **Debuggable**: Derive Debug for easy inspection
//! - **Type-Safe**: Enums replace magic strings, [`DocPath`] replaces raw path strings

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension (without the dot) that marks a file as a document.
pub const DOCUMENT_EXTENSION: &str = "md";

/// Corpus-relative document path.
///
/// Always `/`-separated and normalised: no empty, `.` or `..` segments and
/// no leading slash. This is the unique key of a document everywhere in the
/// graph and in the persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(String);

impl DocPath {
    /// Normalise and validate a corpus-relative path.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let mut segments: Vec<&str> = Vec::new();
        let unified = raw.replace('\\', "/");

        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(Error::path_traversal(raw));
                    }
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(Error::invalid_path(format!("empty document path: {:?}", raw)));
        }

        Ok(Self(segments.join("/")))
    }

    /// Resolve `relative` against the directory `dir` (corpus-relative).
    ///
    /// A leading `/` makes `relative` corpus-root relative instead.
    pub fn resolve_from(dir: &str, relative: &str) -> Result<Self> {
        if relative.starts_with('/') || dir.is_empty() {
            Self::new(relative)
        } else {
            Self::new(format!("{}/{}", dir, relative))
        }
    }

    /// Build a path from a filesystem path relative to `root`.
    pub fn from_fs_path(root: &Path, full: &Path) -> Result<Self> {
        let relative = full
            .strip_prefix(root)
            .map_err(|_| Error::path_traversal(full.display().to_string()))?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(joined)
    }

    /// Borrow as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment, e.g. `Note.md`
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its extension, e.g. `Note`
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    /// Extension without the dot, if any
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => Some(&name[idx + 1..]),
            _ => None,
        }
    }

    /// Whether the path carries the document extension
    pub fn is_document(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
    }

    /// Containing directory (`""` at the corpus root)
    pub fn parent(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Full path with the extension removed, e.g. `folder/Note`
    pub fn without_extension(&self) -> &str {
        match self.extension() {
            Some(ext) => &self.0[..self.0.len() - ext.len() - 1],
            None => &self.0,
        }
    }

    /// Relative path from directory `dir` to this document.
    ///
    /// ```
    /// use vaultlink_core::DocPath;
    ///
    /// let target = DocPath::new("archive/2024/Plan.md").unwrap();
    /// assert_eq!(target.relative_from_dir("notes/daily"), "../../archive/2024/Plan.md");
    /// assert_eq!(target.relative_from_dir("archive"), "2024/Plan.md");
    /// ```
    pub fn relative_from_dir(&self, dir: &str) -> String {
        let from: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.0.split('/').collect();

        let common = from
            .iter()
            .zip(to.iter())
            .take(to.len() - 1)
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<&str> = Vec::with_capacity(from.len() - common + to.len() - common);
        parts.extend(std::iter::repeat_n("..", from.len() - common));
        parts.extend(&to[common..]);
        parts.join("/")
    }

    /// Absolute filesystem location under `root`
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DocPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for DocPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// Position in source text (line, column, byte offset)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl SourcePosition {
    /// Create a new source position
    pub fn new(line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self {
            line,
            column,
            offset,
            length,
        }
    }

    /// Create position from byte offset using a pre-computed line index.
    pub fn from_offset_indexed(index: &LineIndex, offset: usize, length: usize) -> Self {
        let (line, column) = index.line_col(offset);
        Self {
            line,
            column,
            offset,
            length,
        }
    }
}

/// Pre-computed line starts for O(log n) line/column lookup.
///
/// Build once per document, then use for all position lookups.
///
/// # Example
/// ```
/// use vaultlink_core::{LineIndex, SourcePosition};
///
/// let content = "Line 1\nLine 2\nLine 3";
/// let index = LineIndex::new(content);
///
/// let pos = SourcePosition::from_offset_indexed(&index, 7, 6);
/// assert_eq!(pos.line, 2);
/// assert_eq!(pos.column, 1);
/// ```
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets where each line starts (line 1 = index 0)
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build line index in O(n)
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, ch) in content.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Get (line, column) for a byte offset. Both are 1-based.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line_idx = self.line_starts.partition_point(|&start| start <= offset);
        let line = line_idx.max(1);
        let line_start = self
            .line_starts
            .get(line_idx.saturating_sub(1))
            .copied()
            .unwrap_or(0);
        (line, offset - line_start + 1)
    }

    /// Get total number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Syntax a link was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Bracket reference: `[[Note]]`, `[[Note#Heading|Shown]]`
    Bracket,
    /// Embedded bracket reference: `![[Note]]`
    Embed,
    /// Path reference: `[Shown](folder/Note.md)`
    Path,
}

impl LinkKind {
    /// Bracket and embed references share the `[[...]]` grammar
    pub fn is_bracket_form(self) -> bool {
        matches!(self, Self::Bracket | Self::Embed)
    }
}

/// A single link occurrence in a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Link {
    pub kind: LinkKind,
    pub source: DocPath,
    /// Exact matched text, e.g. `![[Note#Intro|see]]`
    pub raw: String,
    /// Target as written, including any `#anchor` suffix
    pub target: String,
    /// Explicit display text (`|alias` or `[text]`)
    pub display_text: Option<String>,
    /// Document the target resolves to
    pub resolved: DocPath,
    pub position: SourcePosition,
}

impl Link {
    /// Target without its anchor suffix
    pub fn target_path(&self) -> &str {
        match self.target.find('#') {
            Some(idx) => &self.target[..idx],
            None => &self.target,
        }
    }

    /// Anchor (heading or `^block`) without the leading `#`
    pub fn anchor(&self) -> Option<&str> {
        self.target.find('#').map(|idx| &self.target[idx + 1..])
    }

    /// Display text, defaulting to the target
    pub fn display(&self) -> &str {
        self.display_text.as_deref().unwrap_or(&self.target)
    }
}

/// A document as enumerated by the document store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentEntry {
    pub path: DocPath,
    /// Modification time in seconds since the Unix epoch
    pub modified: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_path_normalisation() {
        assert_eq!(DocPath::new("./notes//a.md").unwrap().as_str(), "notes/a.md");
        assert_eq!(DocPath::new("/notes/x/../a.md").unwrap().as_str(), "notes/a.md");
        assert_eq!(DocPath::new("notes\\a.md").unwrap().as_str(), "notes/a.md");
        assert!(DocPath::new("../a.md").is_err());
        assert!(DocPath::new("").is_err());
        assert!(DocPath::new("./").is_err());
    }

    #[test]
    fn test_doc_path_parts() {
        let path = DocPath::new("projects/Project Plan.md").unwrap();
        assert_eq!(path.file_name(), "Project Plan.md");
        assert_eq!(path.stem(), "Project Plan");
        assert_eq!(path.extension(), Some("md"));
        assert_eq!(path.parent(), "projects");
        assert_eq!(path.without_extension(), "projects/Project Plan");
        assert!(path.is_document());

        let root = DocPath::new("README").unwrap();
        assert_eq!(root.parent(), "");
        assert_eq!(root.stem(), "README");
        assert_eq!(root.extension(), None);
        assert!(!root.is_document());
    }

    #[test]
    fn test_resolve_from() {
        let resolved = DocPath::resolve_from("notes/daily", "../Plan.md").unwrap();
        assert_eq!(resolved.as_str(), "notes/Plan.md");

        let rooted = DocPath::resolve_from("notes/daily", "/Plan.md").unwrap();
        assert_eq!(rooted.as_str(), "Plan.md");

        assert!(DocPath::resolve_from("notes", "../../Plan.md").is_err());
    }

    #[test]
    fn test_relative_from_dir() {
        let target = DocPath::new("a/b/c.md").unwrap();
        assert_eq!(target.relative_from_dir(""), "a/b/c.md");
        assert_eq!(target.relative_from_dir("a/b"), "c.md");
        assert_eq!(target.relative_from_dir("a/x"), "../b/c.md");
        assert_eq!(target.relative_from_dir("z"), "../a/b/c.md");

        // A directory named like the file itself is not a common prefix
        let flat = DocPath::new("a.md").unwrap();
        assert_eq!(flat.relative_from_dir("a.md"), "../a.md");
    }

    #[test]
    fn test_fs_round_trip() {
        let root = PathBuf::from("/vault");
        let path = DocPath::new("notes/a.md").unwrap();
        let full = path.to_fs_path(&root);
        assert_eq!(full, PathBuf::from("/vault/notes/a.md"));
        assert_eq!(DocPath::from_fs_path(&root, &full).unwrap(), path);
    }

    #[test]
    fn test_link_anchor_and_display() {
        let link = Link {
            kind: LinkKind::Bracket,
            source: DocPath::new("a.md").unwrap(),
            raw: "[[B#Intro]]".to_string(),
            target: "B#Intro".to_string(),
            display_text: None,
            resolved: DocPath::new("B.md").unwrap(),
            position: SourcePosition::new(1, 1, 0, 11),
        };
        assert_eq!(link.target_path(), "B");
        assert_eq!(link.anchor(), Some("Intro"));
        assert_eq!(link.display(), "B#Intro");
    }

    #[test]
    fn test_line_index_multiline() {
        let index = LineIndex::new("Line 1\nLine 2\nLine 3");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(7), (2, 1));
        assert_eq!(index.line_col(13), (2, 7));
        assert_eq!(index.line_col(14), (3, 1));
    }

    #[test]
    fn test_line_index_empty_content() {
        let index = LineIndex::new("");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.line_col(0), (1, 1));
    }
}
