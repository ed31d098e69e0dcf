//! Positional link rewriting.
//!
//! Rewrites operate on scanned reference spans, so only well-formed
//! references change and the surrounding text is preserved byte for byte.

use std::ops::Range;
use vaultlink_core::prelude::*;
use vaultlink_graph::GraphStore;
use vaultlink_parser::RawReference;
use vaultlink_parser::parsers::link_utils::has_document_extension;
use vaultlink_parser::scan_references;

/// Rewritten text and the number of references changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub content: String,
    pub replacements: usize,
}

impl RewriteOutcome {
    /// Whether any reference changed
    pub fn changed(&self) -> bool {
        self.replacements > 0
    }
}

/// How bare-name bracket references to a moved document are rewritten
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BareNames {
    /// `[[Old]]` becomes `[[New]]`
    #[default]
    Keep,
    /// `[[Old]]` becomes `[[dir/New]]`, for when the bare new name would
    /// resolve to some other document
    Qualify,
}

impl BareNames {
    /// Form to use when moving `old` to `new` within `graph`.
    ///
    /// The bare name is taken when another indexed document shares the new
    /// stem or holds it as an alias.
    pub fn for_move(graph: &GraphStore, old: &DocPath, new: &DocPath) -> Self {
        let other = |path: &DocPath| path != old && path != new;
        let taken = graph.documents_with_stem(new.stem()).any(|p| other(p))
            || graph.alias_target(new.stem()).is_some_and(|p| other(p));
        if taken { Self::Qualify } else { Self::Keep }
    }
}

/// Apply non-overlapping `(span, replacement)` edits given in text order
pub(crate) fn splice(text: &str, edits: Vec<(Range<usize>, String)>) -> RewriteOutcome {
    let replacements = edits.len();
    if replacements == 0 {
        return RewriteOutcome {
            content: text.to_string(),
            replacements,
        };
    }

    let mut content = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        content.push_str(&text[cursor..span.start]);
        content.push_str(&replacement);
        cursor = span.end;
    }
    content.push_str(&text[cursor..]);

    RewriteOutcome {
        content,
        replacements,
    }
}

/// New target text for a bracket reference pointing at `old`, if it does
fn rewrite_bracket_target(
    target: &str,
    old: &DocPath,
    new: &DocPath,
    bare: BareNames,
) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }

    let (stem, suffix) = if has_document_extension(target) {
        let cut = target.len() - DOCUMENT_EXTENSION.len() - 1;
        (&target[..cut], &target[cut..])
    } else {
        (target, "")
    };

    let replaced = if stem.contains('/') {
        let old_path = old.without_extension().to_lowercase();
        let stem_lower = stem.to_lowercase();
        let matches = old_path == stem_lower || old_path.ends_with(&format!("/{}", stem_lower));
        matches.then(|| new.without_extension())
    } else {
        stem.eq_ignore_ascii_case(old.stem()).then(|| match bare {
            BareNames::Keep => new.stem(),
            BareNames::Qualify => new.without_extension(),
        })
    }?;

    Some(format!("{}{}", replaced, suffix))
}

/// New target text for a path reference in `source` pointing at `old`
fn rewrite_path_target(
    reference: &RawReference<'_>,
    source: &DocPath,
    old: &DocPath,
    new: &DocPath,
) -> Option<String> {
    if reference.target.trim().is_empty() || reference.resolve(source).ok()? != *old {
        return None;
    }

    if reference.target.trim_start().starts_with('/') {
        Some(format!("/{}", new))
    } else {
        Some(new.relative_from_dir(source.parent()))
    }
}

/// Rewrite every reference in `text` (the content of `source`) that points at
/// `old` so it points at `new`.
///
/// Display text, anchors and embed markers are kept. Bracket references keep
/// their form: a bare name becomes the new name, a path becomes the new path,
/// and an explicit extension stays. Path references get the relative path
/// from the source's directory to `new`.
///
/// ```
/// use vaultlink_core::DocPath;
/// use vaultlink_vault::rewrite::update_links_in_content;
///
/// let source = DocPath::new("Index.md").unwrap();
/// let old = DocPath::new("B.md").unwrap();
/// let new = DocPath::new("archive/B2.md").unwrap();
///
/// let out = update_links_in_content("[[B]], ![[B#Top|Shown]], [[C]]", &source, &old, &new);
/// assert_eq!(out.content, "[[B2]], ![[B2#Top|Shown]], [[C]]");
/// assert_eq!(out.replacements, 2);
/// ```
pub fn update_links_in_content(
    text: &str,
    source: &DocPath,
    old: &DocPath,
    new: &DocPath,
) -> RewriteOutcome {
    update_links_with(text, source, old, new, BareNames::Keep)
}

/// [`update_links_in_content`] with an explicit form for bare-name bracket
/// references
pub fn update_links_with(
    text: &str,
    source: &DocPath,
    old: &DocPath,
    new: &DocPath,
    bare: BareNames,
) -> RewriteOutcome {
    let edits = scan_references(text)
        .into_iter()
        .filter_map(|reference| {
            let target = match reference.kind {
                LinkKind::Bracket | LinkKind::Embed => {
                    rewrite_bracket_target(reference.target, old, new, bare)?
                }
                LinkKind::Path => rewrite_path_target(&reference, source, old, new)?,
            };
            let rendered = reference.render_with_target(&target);
            (rendered != reference.raw(text)).then(|| (reference.span.clone(), rendered))
        })
        .collect();

    splice(text, edits)
}

/// Rewrite the relative path references of a document moving from
/// `old_source` to `new_source` so they resolve to the same documents.
///
/// References to the document itself follow it. Root-relative references and
/// bracket references are vault-relative and stay as written.
pub fn rebase_relative_links(text: &str, old_source: &DocPath, new_source: &DocPath) -> RewriteOutcome {
    let same_dir = old_source.parent() == new_source.parent();

    let edits = scan_references(text)
        .into_iter()
        .filter(|r| r.kind == LinkKind::Path)
        .filter_map(|reference| {
            let written = reference.target.trim();
            if written.is_empty() || written.starts_with('/') {
                return None;
            }

            let resolved = reference.resolve(old_source).ok()?;
            let target = if resolved == *old_source {
                new_source.relative_from_dir(new_source.parent())
            } else if same_dir {
                return None;
            } else {
                resolved.relative_from_dir(new_source.parent())
            };

            let rendered = reference.render_with_target(&target);
            (rendered != reference.raw(text)).then(|| (reference.span.clone(), rendered))
        })
        .collect();

    splice(text, edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str) -> DocPath {
        DocPath::new(path).unwrap()
    }

    #[test]
    fn test_bracket_forms_are_preserved() {
        let source = doc("Index.md");
        let text = "[[B]] [[B|Shown]] ![[B]] [[B#Part]] [[b]] [[B.md]] [[Other]]";
        let out = update_links_in_content(text, &source, &doc("B.md"), &doc("B2.md"));

        assert_eq!(
            out.content,
            "[[B2]] [[B2|Shown]] ![[B2]] [[B2#Part]] [[B2]] [[B2.md]] [[Other]]"
        );
        assert_eq!(out.replacements, 6);
    }

    #[test]
    fn test_path_form_bracket_keeps_path_form() {
        let source = doc("Index.md");
        let text = "[[notes/B]] and [[B]] and [[other/B]]";
        let out = update_links_in_content(text, &source, &doc("notes/B.md"), &doc("archive/C.md"));

        assert_eq!(out.content, "[[archive/C]] and [[C]] and [[other/B]]");
        assert_eq!(out.replacements, 2);
    }

    #[test]
    fn test_qualified_bare_names() {
        let source = doc("Ref.md");
        let text = "[[B]] [[B|Shown]] [[B.md]] [[notes/B]]";
        let out = update_links_with(
            text,
            &source,
            &doc("notes/B.md"),
            &doc("z/C.md"),
            BareNames::Qualify,
        );

        assert_eq!(out.content, "[[z/C]] [[z/C|Shown]] [[z/C.md]] [[z/C]]");
        assert_eq!(out.replacements, 4);
    }

    #[test]
    fn test_bare_names_for_move() {
        let mut graph = GraphStore::new();
        for path in ["notes/B.md", "a/C.md", "Ref.md"] {
            graph.register_document(&doc(path), 1.0);
        }
        graph.index_document(&doc("Ref.md"), "---\naliases: [D]\n---\n", 1.0);

        let old = doc("notes/B.md");
        assert_eq!(BareNames::for_move(&graph, &old, &doc("z/C.md")), BareNames::Qualify);
        assert_eq!(BareNames::for_move(&graph, &old, &doc("z/D.md")), BareNames::Qualify);
        assert_eq!(BareNames::for_move(&graph, &old, &doc("z/E.md")), BareNames::Keep);
        assert_eq!(BareNames::for_move(&graph, &old, &doc("z/B.md")), BareNames::Keep);
    }

    #[test]
    fn test_path_references_are_recomputed() {
        let source = doc("notes/daily/Today.md");
        let text = "[see](../Plan.md) [root](/notes/Plan.md#Goals \"Title\") [other](Plan.md)";
        let out = update_links_in_content(
            text,
            &source,
            &doc("notes/Plan.md"),
            &doc("archive/2024/Plan v2.md"),
        );

        assert_eq!(
            out.content,
            "[see](../../archive/2024/Plan%20v2.md) [root](/archive/2024/Plan%20v2.md#Goals \"Title\") [other](Plan.md)"
        );
        assert_eq!(out.replacements, 2);
    }

    #[test]
    fn test_code_and_unrelated_text_untouched() {
        let source = doc("Index.md");
        let text = "Intro [[B]]\n```\n[[B]]\n```\n`[[B]]` B [B]";
        let out = update_links_in_content(text, &source, &doc("B.md"), &doc("C.md"));

        assert_eq!(out.content, "Intro [[C]]\n```\n[[B]]\n```\n`[[B]]` B [B]");
        assert_eq!(out.replacements, 1);
    }

    #[test]
    fn test_no_match_returns_input() {
        let source = doc("Index.md");
        let out = update_links_in_content("[[A]] [[#Top]]", &source, &doc("B.md"), &doc("C.md"));
        assert!(!out.changed());
        assert_eq!(out.content, "[[A]] [[#Top]]");
    }

    #[test]
    fn test_rebase_relative_links() {
        let text = "[sib](Sibling.md) [up](../Top.md) [self](Note.md#x) [root](/Top.md) [[Top]] [anchor](#here)";
        let out = rebase_relative_links(text, &doc("notes/Note.md"), &doc("archive/deep/Moved.md"));

        assert_eq!(
            out.content,
            "[sib](../../notes/Sibling.md) [up](../../Top.md) [self](Moved.md#x) [root](/Top.md) [[Top]] [anchor](#here)"
        );
        assert_eq!(out.replacements, 3);
    }

    #[test]
    fn test_rebase_same_directory_only_touches_self() {
        let text = "[sib](Sibling.md) [self](Note.md)";
        let out = rebase_relative_links(text, &doc("notes/Note.md"), &doc("notes/Renamed.md"));
        assert_eq!(out.content, "[sib](Sibling.md) [self](Renamed.md)");
        assert_eq!(out.replacements, 1);
    }
}
