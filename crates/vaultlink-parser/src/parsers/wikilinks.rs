//! Bracket reference scanner: `[[Note]]`, `[[folder/Note]]`, `[[Note#Heading]]`,
//! `[[Note#^block|Shown]]`, and the embed form `![[Note]]`.

use super::RawReference;
use super::link_utils::split_anchor;
use regex::Regex;
use std::sync::LazyLock;
use vaultlink_core::LinkKind;

/// Matches `[[...]]` with an optional leading embed marker. Nested or
/// unbalanced brackets never match.
static BRACKET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[\[([^\[\]\n]+)\]\]").unwrap());

/// Fast pre-filter: skip regex if no bracket pattern exists.
#[inline]
fn has_bracket_link(content: &str) -> bool {
    content.contains("[[")
}

/// Scan all bracket and embed references in text order.
pub fn scan_bracket_references(content: &str) -> Vec<RawReference<'_>> {
    if !has_bracket_link(content) {
        return Vec::new();
    }

    BRACKET_PATTERN
        .captures_iter(content)
        .filter_map(|caps| {
            let full = caps.get(0)?;
            let inner = caps.get(2)?.as_str();
            let kind = if caps.get(1).is_some_and(|m| !m.as_str().is_empty()) {
                LinkKind::Embed
            } else {
                LinkKind::Bracket
            };

            // [[target#anchor|display]]
            let (target_part, display) = match inner.find('|') {
                Some(idx) => (&inner[..idx], Some(&inner[idx + 1..])),
                None => (inner, None),
            };
            let (target, anchor) = split_anchor(target_part);

            // `[[|x]]` has nothing to point at
            if target.trim().is_empty() && anchor.is_none() {
                return None;
            }

            Some(RawReference {
                kind,
                span: full.range(),
                target,
                anchor,
                display,
                title: None,
                angle: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_and_display() {
        let refs = scan_bracket_references("[[Note]] and [[Other|Shown]]");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].target, "Note");
        assert_eq!(refs[0].display, None);
        assert_eq!(refs[1].target, "Other");
        assert_eq!(refs[1].display, Some("Shown"));
        assert_eq!(refs[1].span, 13..28);
    }

    #[test]
    fn test_anchor_and_block() {
        let refs = scan_bracket_references("[[Note#Heading]] [[Note#^abc123|b]]");
        assert_eq!(refs[0].target, "Note");
        assert_eq!(refs[0].anchor, Some("Heading"));
        assert_eq!(refs[1].anchor, Some("^abc123"));
        assert_eq!(refs[1].display, Some("b"));
    }

    #[test]
    fn test_embed_marker() {
        let refs = scan_bracket_references("![[Diagram]] [[Plain]]");
        assert_eq!(refs[0].kind, LinkKind::Embed);
        assert_eq!(refs[0].span.start, 0);
        assert_eq!(refs[1].kind, LinkKind::Bracket);
    }

    #[test]
    fn test_malformed_is_skipped() {
        assert!(scan_bracket_references("[[open only").is_empty());
        assert!(scan_bracket_references("[[]]").is_empty());
        assert!(scan_bracket_references("[[|display]]").is_empty());
        assert!(scan_bracket_references("[[line\nbreak]]").is_empty());

        // The inner well-formed reference is still found
        let refs = scan_bracket_references("[[broken [[Good]]");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, "Good");
    }
}
