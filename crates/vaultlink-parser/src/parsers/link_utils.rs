//! Shared utilities for resolving reference targets to document paths.
//!
//! Bracket and path references resolve differently:
//! - Bracket targets are vault-relative names; the document extension is
//!   appended when missing, and an empty target points at the source itself.
//! - Path targets are relative to the source document's directory (or the
//!   vault root with a leading `/`), and may be percent-encoded.

use vaultlink_core::{DOCUMENT_EXTENSION, DocPath, Result};

/// Split `target#anchor` into the path part and the anchor (without `#`).
///
/// ```
/// use vaultlink_parser::parsers::link_utils::split_anchor;
///
/// assert_eq!(split_anchor("Note#Intro"), ("Note", Some("Intro")));
/// assert_eq!(split_anchor("Note#^block"), ("Note", Some("^block")));
/// assert_eq!(split_anchor("#Intro"), ("", Some("Intro")));
/// assert_eq!(split_anchor("Note"), ("Note", None));
/// ```
pub fn split_anchor(target: &str) -> (&str, Option<&str>) {
    match target.find('#') {
        Some(idx) => (&target[..idx], Some(&target[idx + 1..])),
        None => (target, None),
    }
}

/// Whether a path target carries the document extension
pub fn has_document_extension(target: &str) -> bool {
    let suffix = format!(".{}", DOCUMENT_EXTENSION);
    target.len() > suffix.len()
        && target
            .get(target.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(&suffix))
}

/// Whether a URL points outside the vault (`https://`, `mailto:`, ...)
pub fn is_external(url: &str) -> bool {
    if url.contains("://") {
        return true;
    }
    // scheme:rest with an alphabetic scheme, e.g. mailto:, obsidian:
    match url.find(':') {
        Some(idx) if idx > 1 => url[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Decode `%XX` escapes in a path target. Invalid escapes are kept verbatim.
pub fn decode_path(target: &str) -> String {
    if !target.contains('%') {
        return target.to_string();
    }

    let bytes = target.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| target.to_string())
}

/// Encode a document path for use as a path reference target.
///
/// Only spaces are escaped, matching what editors write.
pub fn encode_path(path: &str) -> String {
    path.replace(' ', "%20")
}

/// Append the document extension when the target has none
pub fn with_document_extension(target: &str) -> String {
    if has_document_extension(target) {
        target.to_string()
    } else {
        format!("{}.{}", target, DOCUMENT_EXTENSION)
    }
}

/// Resolve a bracket target (anchor already stripped) from `source`.
pub fn resolve_bracket_target(source: &DocPath, target: &str) -> Result<DocPath> {
    let target = target.trim();
    if target.is_empty() {
        return Ok(source.clone());
    }
    DocPath::new(with_document_extension(target))
}

/// Resolve a path target (anchor already stripped) from `source`.
pub fn resolve_path_target(source: &DocPath, target: &str) -> Result<DocPath> {
    let decoded = decode_path(target.trim());
    if decoded.is_empty() {
        return Ok(source.clone());
    }
    DocPath::resolve_from(source.parent(), &decoded)
}
