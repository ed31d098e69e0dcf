//! Reference scanning and link extraction.
//!
//! Scanning produces [`RawReference`]s: borrowed views of each reference with
//! its byte span, used both for extraction into [`Link`] records and for
//! positional rewriting. Matches inside fenced code blocks and inline code
//! are excluded.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use vaultlink_core::{DocPath, LineIndex, Link, LinkKind, Result, SourcePosition};

pub mod frontmatter_parser;
pub mod link_utils;
pub mod markdown_links;
pub mod wikilinks;

use link_utils::{encode_path, resolve_bracket_target, resolve_path_target};

/// Fenced code blocks (``` or ~~~), closed or running to the end of text
static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*(```|~~~)[^\n]*\n.*?(?:^[ \t]*(```|~~~)[ \t]*$|\z)").unwrap()
});

/// Inline code spans on a single line
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`\n]+`").unwrap());

/// A reference as it appears in the text, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference<'a> {
    pub kind: LinkKind,
    /// Byte range of the full match, including any embed marker
    pub span: Range<usize>,
    /// Target path as written, without anchor (path targets stay encoded)
    pub target: &'a str,
    /// Anchor without the leading `#`
    pub anchor: Option<&'a str>,
    /// `|display` for bracket forms, `[text]` for path references
    pub display: Option<&'a str>,
    /// Optional `"title"` of a path reference
    pub title: Option<&'a str>,
    /// Path reference written as `(<target>)`
    pub angle: bool,
}

impl<'a> RawReference<'a> {
    /// Exact matched text
    pub fn raw<'t>(&self, text: &'t str) -> &'t str {
        &text[self.span.clone()]
    }

    /// Target including its `#anchor` suffix, as written
    pub fn full_target(&self) -> String {
        match self.anchor {
            Some(anchor) => format!("{}#{}", self.target, anchor),
            None => self.target.to_string(),
        }
    }

    /// Resolve the target path relative to `source`
    pub fn resolve(&self, source: &DocPath) -> Result<DocPath> {
        match self.kind {
            LinkKind::Bracket | LinkKind::Embed => resolve_bracket_target(source, self.target),
            LinkKind::Path => resolve_path_target(source, self.target),
        }
    }

    /// Render this reference pointing at `target`, keeping anchor,
    /// display text, title and embed marker.
    ///
    /// Path targets are given unencoded; spaces are escaped unless the
    /// reference uses the `<...>` form.
    pub fn render_with_target(&self, target: &str) -> String {
        let anchor = self.anchor.map(|a| format!("#{}", a)).unwrap_or_default();
        match self.kind {
            LinkKind::Bracket | LinkKind::Embed => {
                let marker = if self.kind == LinkKind::Embed { "!" } else { "" };
                let display = self.display.map(|d| format!("|{}", d)).unwrap_or_default();
                format!("{}[[{}{}{}]]", marker, target, anchor, display)
            }
            LinkKind::Path => {
                let destination = if self.angle {
                    format!("<{}{}>", target, anchor)
                } else {
                    format!("{}{}", encode_path(target), anchor)
                };
                let title = self
                    .title
                    .map(|t| format!(" \"{}\"", t))
                    .unwrap_or_default();
                format!(
                    "[{}]({}{})",
                    self.display.unwrap_or_default(),
                    destination,
                    title
                )
            }
        }
    }
}

/// Byte ranges of code the scanners must ignore
fn code_ranges(text: &str) -> Vec<Range<usize>> {
    if !text.contains('`') && !text.contains("~~~") {
        return Vec::new();
    }

    let mut ranges: Vec<Range<usize>> = FENCED_CODE.find_iter(text).map(|m| m.range()).collect();
    let fenced = ranges.clone();
    ranges.extend(
        INLINE_CODE
            .find_iter(text)
            .map(|m| m.range())
            .filter(|r| !fenced.iter().any(|f| f.contains(&r.start))),
    );
    ranges
}

/// Scan every bracket, embed and path reference in text order.
pub fn scan_references(text: &str) -> Vec<RawReference<'_>> {
    let mut refs = wikilinks::scan_bracket_references(text);
    refs.extend(markdown_links::scan_path_references(text));

    let code = code_ranges(text);
    if !code.is_empty() {
        refs.retain(|r| !code.iter().any(|c| c.contains(&r.span.start)));
    }

    refs.sort_by_key(|r| r.span.start);
    refs
}

/// Extract all links of `source` in scan order (top to bottom, left to right).
///
/// Every occurrence yields its own record. References whose target cannot be
/// resolved to a valid vault path (e.g. escaping the root) are skipped.
///
/// ```
/// use vaultlink_core::{DocPath, LinkKind};
/// use vaultlink_parser::extract_links;
///
/// let source = DocPath::new("notes/today.md").unwrap();
/// let links = extract_links("See [[Plan#Goals|the plan]] and [old](../archive/Plan.md)", &source);
///
/// assert_eq!(links.len(), 2);
/// assert_eq!(links[0].kind, LinkKind::Bracket);
/// assert_eq!(links[0].resolved.as_str(), "Plan.md");
/// assert_eq!(links[0].display(), "the plan");
/// assert_eq!(links[1].resolved.as_str(), "archive/Plan.md");
/// ```
pub fn extract_links(text: &str, source: &DocPath) -> Vec<Link> {
    let refs = scan_references(text);
    if refs.is_empty() {
        return Vec::new();
    }

    let index = LineIndex::new(text);
    refs.iter()
        .filter_map(|r| {
            let resolved = match r.resolve(source) {
                Ok(path) => path,
                Err(e) => {
                    log::debug!("Skipping unresolvable link in {}: {}", source, e);
                    return None;
                }
            };

            let display_text = r.display.filter(|d| !d.is_empty()).map(str::to_string);
            Some(Link {
                kind: r.kind,
                source: source.clone(),
                raw: r.raw(text).to_string(),
                target: r.full_target(),
                display_text,
                resolved,
                position: SourcePosition::from_offset_indexed(
                    &index,
                    r.span.start,
                    r.span.len(),
                ),
            })
        })
        .collect()
}
