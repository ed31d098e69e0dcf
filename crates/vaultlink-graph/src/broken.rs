//! Broken link detection with repair suggestions

use crate::graph::GraphStore;
use serde::{Deserialize, Serialize};
use vaultlink_core::{DocPath, Link};

/// Minimum similarity (exclusive) for a suggested repair target
pub const SUGGESTION_THRESHOLD: f64 = 0.7;

/// A candidate document for a dangling target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub path: DocPath,
    pub score: f64,
}

/// An edge whose target is not an indexed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub source: DocPath,
    pub target: DocPath,
    /// Every occurrence of the edge, in scan order
    pub links: Vec<Link>,
    pub suggestion: Option<Suggestion>,
}

/// Finds dangling edges in a graph
pub struct BrokenLinkDetector<'a> {
    graph: &'a GraphStore,
}

impl<'a> BrokenLinkDetector<'a> {
    /// Create a new detector
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// Every broken edge, sorted by (source, target)
    pub fn find_broken_links(&self) -> Vec<BrokenLink> {
        let documents = self.graph.documents();

        self.graph
            .edges()
            .into_iter()
            .filter(|(_, target)| !self.graph.contains(target))
            .map(|(source, target)| {
                let links = self.graph.link_details(&source, &target).to_vec();
                let suggestion = suggest_from(&documents, &target);
                BrokenLink {
                    source,
                    target,
                    links,
                    suggestion,
                }
            })
            .collect()
    }

    /// Best indexed document for a dangling target, if similar enough
    pub fn suggest_target(&self, target: &DocPath) -> Option<Suggestion> {
        suggest_from(&self.graph.documents(), target)
    }
}

/// Compare stems case-insensitively by normalised edit distance
/// (`1 - distance / max(len)`). The first best match in path order wins.
fn suggest_from(documents: &[DocPath], target: &DocPath) -> Option<Suggestion> {
    let wanted = target.stem().to_lowercase();
    let mut best: Option<Suggestion> = None;

    for path in documents {
        let score = strsim::normalized_levenshtein(&wanted, &path.stem().to_lowercase());
        if score > SUGGESTION_THRESHOLD && best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(Suggestion {
                path: path.clone(),
                score,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str) -> DocPath {
        DocPath::new(path).unwrap()
    }

    fn graph_of(docs: &[(&str, &str)]) -> GraphStore {
        let mut graph = GraphStore::new();
        for (path, _) in docs {
            graph.register_document(&doc(path), 1.0);
        }
        for (path, text) in docs {
            graph.index_document(&doc(path), text, 1.0);
        }
        graph
    }

    #[test]
    fn test_typo_gets_suggestion() {
        let graph = graph_of(&[
            ("Daily.md", "See [[Projcet Plan]] and [[Projcet Plan|the plan]]"),
            ("projects/Project Plan.md", ""),
        ]);

        let broken = BrokenLinkDetector::new(&graph).find_broken_links();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].source, doc("Daily.md"));
        assert_eq!(broken[0].target, doc("Projcet Plan.md"));
        assert_eq!(broken[0].links.len(), 2);

        let suggestion = broken[0].suggestion.as_ref().unwrap();
        assert_eq!(suggestion.path, doc("projects/Project Plan.md"));
        assert!(suggestion.score > SUGGESTION_THRESHOLD);
    }

    #[test]
    fn test_unrelated_target_has_no_suggestion() {
        let graph = graph_of(&[("A.md", "[[Zebra crossing]]"), ("Budget.md", "")]);
        let broken = BrokenLinkDetector::new(&graph).find_broken_links();
        assert_eq!(broken.len(), 1);
        assert!(broken[0].suggestion.is_none());
    }

    #[test]
    fn test_valid_links_are_not_reported() {
        let graph = graph_of(&[("A.md", "[[B]] [[#Self]]"), ("B.md", "[[A]]")]);
        assert!(BrokenLinkDetector::new(&graph).find_broken_links().is_empty());
    }

    #[test]
    fn test_suggestion_is_case_insensitive() {
        let graph = graph_of(&[("Meeting Notes.md", "")]);
        let detector = BrokenLinkDetector::new(&graph);
        let suggestion = detector.suggest_target(&doc("meeting note.md")).unwrap();
        assert_eq!(suggestion.path, doc("Meeting Notes.md"));
    }
}
