//! Move detection by link fingerprint.
//!
//! A document that disappears while another appears with (nearly) the same
//! outgoing links is treated as moved. The classifier is a pure function of
//! two fingerprints so it can be tested without a filesystem.

use crate::graph::GraphStore;
use crate::resolver::LinkResolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vaultlink_core::DocPath;
use vaultlink_parser::{extract_aliases, extract_links};

/// Minimum similarity (exclusive) for a deleted/new pair to count as a move
pub const MOVE_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Outgoing link targets and declared aliases of a document.
///
/// Self links are left out so a moved document's links to itself do not
/// count against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    pub targets: BTreeSet<DocPath>,
    pub aliases: BTreeSet<String>,
}

impl Fingerprint {
    /// Build from explicit parts
    pub fn new(
        targets: impl IntoIterator<Item = DocPath>,
        aliases: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            aliases: aliases.into_iter().collect(),
        }
    }

    /// Fingerprint of an already indexed document
    pub fn from_graph(graph: &GraphStore, path: &DocPath) -> Self {
        Self::new(
            graph.forward_links(path).into_iter().filter(|t| t != path),
            graph.aliases_of(path),
        )
    }

    /// Fingerprint of unindexed content, resolved against `graph`
    pub fn from_content(graph: &GraphStore, path: &DocPath, text: &str) -> Self {
        let resolver = LinkResolver::new(graph);
        Self::new(
            extract_links(text, path)
                .iter()
                .map(|link| resolver.resolve(link))
                .filter(|t| t != path),
            extract_aliases(text),
        )
    }

    /// Whether there are no links to compare
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Jaccard index of two fingerprints (targets and aliases together).
///
/// A fingerprint without links never matches anything.
///
/// ```
/// use vaultlink_core::DocPath;
/// use vaultlink_graph::{Fingerprint, similarity};
///
/// let t = |p: &str| DocPath::new(p).unwrap();
/// let a = Fingerprint::new([t("A.md"), t("B.md")], []);
/// let b = Fingerprint::new([t("A.md"), t("B.md"), t("C.md"), t("D.md")], []);
/// assert_eq!(similarity(&a, &b), 0.5);
/// assert_eq!(similarity(&a, &Fingerprint::default()), 0.0);
/// ```
pub fn similarity(a: &Fingerprint, b: &Fingerprint) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let shared = a.targets.intersection(&b.targets).count()
        + a.aliases.intersection(&b.aliases).count();
    let total = a.targets.union(&b.targets).count() + a.aliases.union(&b.aliases).count();

    shared as f64 / total as f64
}

/// A deleted document matched with the new document it became
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePair {
    pub from: DocPath,
    pub to: DocPath,
    pub score: f64,
}

/// Greedily pair deleted documents with new ones.
///
/// Deleted documents are taken in the given order; each gets the unmatched
/// new document with the highest score above [`MOVE_SIMILARITY_THRESHOLD`].
/// Ties go to the earlier new document. `is_excluded(from, to)` vetoes a
/// pairing outright.
pub fn match_moves(
    deleted: &[(DocPath, Fingerprint)],
    new: &[(DocPath, Fingerprint)],
    is_excluded: impl Fn(&DocPath, &DocPath) -> bool,
) -> Vec<MovePair> {
    let mut taken = vec![false; new.len()];
    let mut pairs = Vec::new();

    for (from, fingerprint) in deleted {
        let mut best: Option<(usize, f64)> = None;
        for (i, (to, candidate)) in new.iter().enumerate() {
            if taken[i] || is_excluded(from, to) {
                continue;
            }
            let score = similarity(fingerprint, candidate);
            if score > MOVE_SIMILARITY_THRESHOLD && best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        if let Some((i, score)) = best {
            taken[i] = true;
            pairs.push(MovePair {
                from: from.clone(),
                to: new[i].0.clone(),
                score,
            });
        }
    }

    pairs
}
