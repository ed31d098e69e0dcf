//! Path reference scanner: `[text](note.md)`, `[text](note.md#anchor)`,
//! `[text](<note with spaces.md> "title")`.
//!
//! Only targets ending in the document extension are references; images
//! (`![alt](url)`) and external URLs never are.

use super::RawReference;
use super::link_utils::{decode_path, has_document_extension, is_external, split_anchor};
use regex::Regex;
use std::sync::LazyLock;
use vaultlink_core::LinkKind;

/// Matches markdown links with an optional leading `!` (filtered after matching,
/// the regex crate has no look-behind).
static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<bang>!?)\[(?P<text>[^\[\]\n]*)\]\((?:<(?P<angle>[^<>\n]+)>|(?P<url>[^()\s<>]+))(?:\s+"(?P<title>[^"\n]*)")?\)"#,
    )
    .unwrap()
});

/// Fast pre-filter: skip regex if no markdown link pattern exists.
#[inline]
fn has_markdown_link(content: &str) -> bool {
    content.contains("](")
}

/// Scan all path references in text order.
pub fn scan_path_references(content: &str) -> Vec<RawReference<'_>> {
    if !has_markdown_link(content) {
        return Vec::new();
    }

    MARKDOWN_LINK
        .captures_iter(content)
        .filter_map(|caps| {
            let full = caps.get(0)?;
            if caps.name("bang").is_some_and(|m| !m.as_str().is_empty()) {
                return None;
            }

            let (url, angle) = match caps.name("angle") {
                Some(m) => (m.as_str(), true),
                None => (caps.name("url")?.as_str(), false),
            };
            if is_external(url) {
                return None;
            }

            let (target, anchor) = split_anchor(url);
            if !has_document_extension(&decode_path(target)) {
                return None;
            }

            Some(RawReference {
                kind: LinkKind::Path,
                span: full.range(),
                target,
                anchor,
                display: caps.name("text").map(|m| m.as_str()),
                title: caps.name("title").map(|m| m.as_str()),
                angle,
            })
        })
        .collect()
}
