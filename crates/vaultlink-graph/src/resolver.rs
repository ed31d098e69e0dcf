//! Graph-aware link resolution.
//!
//! Bracket targets are names, not paths: `[[Plan]]` may refer to
//! `projects/Plan.md`. Resolution order:
//! 1. the literal resolved path, when it is an indexed document
//! 2. the alias table
//! 3. basename match among indexed documents (`folder/Note` matches any path
//!    ending in it); the first in sorted order wins
//! 4. the literal path, left dangling
//!
//! Path references are explicit relative paths and always resolve literally.

use crate::graph::GraphStore;
use vaultlink_core::{DOCUMENT_EXTENSION, DocPath, Link, LinkKind};
use vaultlink_parser::parsers::link_utils::has_document_extension;

/// Resolves extracted links against the documents known to a graph
pub struct LinkResolver<'a> {
    graph: &'a GraphStore,
}

impl<'a> LinkResolver<'a> {
    /// Create a resolver over `graph`
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// Final target of `link`
    pub fn resolve(&self, link: &Link) -> DocPath {
        if link.kind == LinkKind::Path || self.graph.contains(&link.resolved) {
            return link.resolved.clone();
        }

        let name = link.target_path().trim();
        if name.is_empty() {
            return link.resolved.clone();
        }

        self.resolve_name(name)
            .unwrap_or_else(|| link.resolved.clone())
    }

    /// Resolve a bare bracket name through aliases and basenames
    pub fn resolve_name(&self, name: &str) -> Option<DocPath> {
        if let Some(owner) = self.graph.alias_target(name)
            && self.graph.contains(owner)
        {
            return Some(owner.clone());
        }

        let name = if has_document_extension(name) {
            &name[..name.len() - DOCUMENT_EXTENSION.len() - 1]
        } else {
            name
        };
        let wanted = name.trim_matches('/').to_lowercase();
        let stem = wanted.rsplit('/').next().unwrap_or(wanted.as_str());

        self.graph
            .documents_with_stem(stem)
            .find(|path| {
                let candidate = path.without_extension().to_lowercase();
                candidate == wanted || candidate.ends_with(&format!("/{}", wanted))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultlink_parser::extract_links;

    fn doc(path: &str) -> DocPath {
        DocPath::new(path).unwrap()
    }

    fn graph_with(paths: &[&str]) -> GraphStore {
        let mut graph = GraphStore::new();
        for path in paths {
            graph.register_document(&doc(path), 1.0);
        }
        graph
    }

    fn resolve_first(graph: &GraphStore, text: &str) -> DocPath {
        let source = doc("notes/source.md");
        let links = extract_links(text, &source);
        LinkResolver::new(graph).resolve(&links[0])
    }

    #[test]
    fn test_exact_path_wins() {
        let graph = graph_with(&["Plan.md", "projects/Plan.md"]);
        assert_eq!(resolve_first(&graph, "[[Plan]]"), doc("Plan.md"));
    }

    #[test]
    fn test_basename_match() {
        let graph = graph_with(&["projects/Project Plan.md", "archive/b/Other.md"]);
        assert_eq!(
            resolve_first(&graph, "[[Project Plan#Goals]]"),
            doc("projects/Project Plan.md")
        );
        assert_eq!(resolve_first(&graph, "[[b/other]]"), doc("archive/b/Other.md"));
    }

    #[test]
    fn test_first_sorted_candidate_wins() {
        let graph = graph_with(&["z/Note.md", "a/Note.md"]);
        assert_eq!(resolve_first(&graph, "[[Note]]"), doc("a/Note.md"));
    }

    #[test]
    fn test_alias_resolution() {
        let mut graph = graph_with(&["Roadmap.md"]);
        graph.index_document(&doc("Roadmap.md"), "---\naliases: [Q3 Plan]\n---\n", 1.0);
        assert_eq!(resolve_first(&graph, "[[Q3 Plan]]"), doc("Roadmap.md"));
    }

    #[test]
    fn test_unknown_stays_literal() {
        let graph = graph_with(&["Other.md"]);
        assert_eq!(resolve_first(&graph, "[[Missing]]"), doc("Missing.md"));
    }

    #[test]
    fn test_path_references_are_literal() {
        let graph = graph_with(&["Plan.md"]);
        assert_eq!(resolve_first(&graph, "[x](Plan.md)"), doc("notes/Plan.md"));
    }
}
