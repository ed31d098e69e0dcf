//! Bidirectional link index over vault documents

use crate::resolver::LinkResolver;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use vaultlink_core::prelude::*;
use vaultlink_parser::{extract_aliases, extract_links};

/// Link graph for a vault.
///
/// Forward links are deduplicated per source; `link_details` keeps every
/// occurrence with its position. `back_links` is maintained as the exact
/// transpose of `forward_links`, so lookups in both directions are map
/// lookups rather than scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    /// source -> unique targets
    pub(crate) forward_links: HashMap<DocPath, HashSet<DocPath>>,

    /// target -> sources, in first-indexed order
    pub(crate) back_links: HashMap<DocPath, Vec<DocPath>>,

    /// (source, target) -> every occurrence in scan order
    pub(crate) link_details: HashMap<(DocPath, DocPath), Vec<Link>>,

    /// alias -> declaring document (may go stale)
    pub(crate) aliases: HashMap<String, DocPath>,

    /// document -> last indexed modification time
    pub(crate) file_timestamps: HashMap<DocPath, f64>,

    /// lowercase stem -> documents, derived from `file_timestamps`
    pub(crate) stems: HashMap<String, BTreeSet<DocPath>>,
}

impl GraphStore {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a known document before its links are indexed.
    ///
    /// Registering every document first makes resolution during a full
    /// build independent of indexing order.
    pub fn register_document(&mut self, path: &DocPath, modified: f64) {
        self.file_timestamps.insert(path.clone(), modified);
        self.stems
            .entry(path.stem().to_lowercase())
            .or_default()
            .insert(path.clone());
    }

    /// Index `text` as the content of `path`, replacing any previous entry
    /// for the document. Returns the number of link occurrences.
    pub fn index_document(&mut self, path: &DocPath, text: &str, modified: f64) -> usize {
        self.clear_outgoing(path);
        self.aliases.retain(|_, owner| owner != path);
        self.register_document(path, modified);

        for alias in extract_aliases(text) {
            if let Some(previous) = self.aliases.insert(alias.clone(), path.clone())
                && &previous != path
            {
                log::debug!("Alias '{}' moved from {} to {}", alias, previous, path);
            }
        }

        let links: Vec<Link> = {
            let resolver = LinkResolver::new(self);
            extract_links(text, path)
                .into_iter()
                .map(|mut link| {
                    link.resolved = resolver.resolve(&link);
                    link
                })
                .collect()
        };
        let count = links.len();

        let mut targets = HashSet::new();
        for link in links {
            targets.insert(link.resolved.clone());
            self.link_details
                .entry((path.clone(), link.resolved.clone()))
                .or_default()
                .push(link);
        }

        for target in &targets {
            let sources = self.back_links.entry(target.clone()).or_default();
            if !sources.contains(path) {
                sources.push(path.clone());
            }
        }
        self.forward_links.insert(path.clone(), targets);

        count
    }

    /// Remove a document's own entries: outgoing edges, details, timestamp
    /// and declared aliases. Incoming edges from other documents remain.
    ///
    /// Returns whether the document was indexed.
    pub fn remove_document(&mut self, path: &DocPath) -> bool {
        self.clear_outgoing(path);
        self.aliases.retain(|_, owner| owner != path);

        if let Some(set) = self.stems.get_mut(&path.stem().to_lowercase()) {
            set.remove(path);
            if set.is_empty() {
                self.stems.remove(&path.stem().to_lowercase());
            }
        }

        self.file_timestamps.remove(path).is_some()
    }

    fn clear_outgoing(&mut self, path: &DocPath) {
        let Some(targets) = self.forward_links.remove(path) else {
            return;
        };

        for target in targets {
            if let Some(sources) = self.back_links.get_mut(&target) {
                sources.retain(|s| s != path);
                if sources.is_empty() {
                    self.back_links.remove(&target);
                }
            }
            self.link_details.remove(&(path.clone(), target));
        }
    }

    /// Relabel every structural reference to `old` as `new`.
    ///
    /// Touches forward and backlink keys, detail keys and the `source` /
    /// `resolved` fields of their records, alias values, other documents'
    /// forward sets and backlink lists, and the timestamp. Document content
    /// is not touched. Returns whether `old` was an indexed document.
    pub fn rename_path(&mut self, old: &DocPath, new: &DocPath) -> bool {
        if old == new {
            return self.contains(old);
        }

        let relabel = |p: &DocPath| if p == old { new.clone() } else { p.clone() };
        let outgoing = self.forward_links.remove(old);
        let incoming = self.back_links.remove(old).unwrap_or_default();

        // The document's own outgoing edges
        if let Some(targets) = &outgoing {
            let mut relabelled = HashSet::with_capacity(targets.len());
            for target in targets {
                let new_target = relabel(target);
                if let Some(mut links) = self.link_details.remove(&(old.clone(), target.clone())) {
                    for link in &mut links {
                        link.source = new.clone();
                        link.resolved = new_target.clone();
                    }
                    self.link_details
                        .entry((new.clone(), new_target.clone()))
                        .or_default()
                        .extend(links);
                }
                if target != old
                    && let Some(sources) = self.back_links.get_mut(target)
                {
                    for source in sources.iter_mut() {
                        if source == old {
                            *source = new.clone();
                        }
                    }
                }
                relabelled.insert(new_target);
            }
            self.forward_links
                .entry(new.clone())
                .or_default()
                .extend(relabelled);
        }

        // Edges from other documents into `old`
        let mut new_sources = self.back_links.remove(new).unwrap_or_default();
        for source in incoming {
            let source = relabel(&source);
            if source != *new {
                if let Some(targets) = self.forward_links.get_mut(&source) {
                    targets.remove(old);
                    targets.insert(new.clone());
                }
                if let Some(mut links) = self.link_details.remove(&(source.clone(), old.clone())) {
                    for link in &mut links {
                        link.resolved = new.clone();
                    }
                    self.link_details
                        .entry((source.clone(), new.clone()))
                        .or_default()
                        .extend(links);
                }
            }
            if !new_sources.contains(&source) {
                new_sources.push(source);
            }
        }
        if !new_sources.is_empty() {
            self.back_links.insert(new.clone(), new_sources);
        }

        for owner in self.aliases.values_mut() {
            if owner == old {
                *owner = new.clone();
            }
        }

        match self.file_timestamps.remove(old) {
            Some(modified) => {
                self.remove_stem(old);
                self.register_document(new, modified);
                true
            }
            None => false,
        }
    }

    fn remove_stem(&mut self, path: &DocPath) {
        let key = path.stem().to_lowercase();
        if let Some(set) = self.stems.get_mut(&key) {
            set.remove(path);
            if set.is_empty() {
                self.stems.remove(&key);
            }
        }
    }

    /// Documents linking to `path`
    pub fn backlinks(&self, path: &DocPath) -> &[DocPath] {
        self.back_links
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Unique targets of `path`, sorted
    pub fn forward_links(&self, path: &DocPath) -> Vec<DocPath> {
        let mut targets: Vec<DocPath> = self
            .forward_links
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        targets.sort();
        targets
    }

    /// Every occurrence of `source` linking to `target`, in scan order
    pub fn link_details(&self, source: &DocPath, target: &DocPath) -> &[Link] {
        self.link_details
            .get(&(source.clone(), target.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every link occurrence in `source`, in scan order
    pub fn links_from(&self, source: &DocPath) -> Vec<&Link> {
        let mut links: Vec<&Link> = self
            .forward_links
            .get(source)
            .into_iter()
            .flatten()
            .flat_map(|target| self.link_details(source, target))
            .collect();
        links.sort_by_key(|l| l.position.offset);
        links
    }

    /// Whether `path` is an indexed document
    pub fn contains(&self, path: &DocPath) -> bool {
        self.file_timestamps.contains_key(path)
    }

    /// Last indexed modification time of `path`
    pub fn timestamp(&self, path: &DocPath) -> Option<f64> {
        self.file_timestamps.get(path).copied()
    }

    /// All indexed documents, sorted
    pub fn documents(&self) -> Vec<DocPath> {
        let mut docs: Vec<DocPath> = self.file_timestamps.keys().cloned().collect();
        docs.sort();
        docs
    }

    /// Number of indexed documents
    pub fn document_count(&self) -> usize {
        self.file_timestamps.len()
    }

    /// Aliases declared by `path`, sorted
    pub fn aliases_of(&self, path: &DocPath) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, owner)| *owner == path)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    /// Document an alias points at, if any
    pub fn alias_target(&self, alias: &str) -> Option<&DocPath> {
        self.aliases.get(alias)
    }

    /// Indexed documents sharing a stem (case-insensitive), sorted
    pub fn documents_with_stem<'a>(
        &'a self,
        stem: &str,
    ) -> impl Iterator<Item = &'a DocPath> + use<'a> {
        self.stems.get(&stem.to_lowercase()).into_iter().flatten()
    }

    /// All (source, target) edges, sorted
    pub fn edges(&self) -> Vec<(DocPath, DocPath)> {
        let mut edges: Vec<(DocPath, DocPath)> = self
            .forward_links
            .iter()
            .flat_map(|(source, targets)| targets.iter().map(|t| (source.clone(), t.clone())))
            .collect();
        edges.sort();
        edges
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        let edges = self.forward_links.values().map(HashSet::len).sum();
        let dangling_edges = self
            .forward_links
            .values()
            .flatten()
            .filter(|t| !self.contains(t))
            .count();

        GraphStats {
            documents: self.file_timestamps.len(),
            edges,
            link_occurrences: self.link_details.values().map(Vec::len).sum(),
            aliases: self.aliases.len(),
            dangling_edges,
        }
    }

    /// Check the structural invariants, returning every violation found.
    pub fn verify_consistency(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (source, targets) in &self.forward_links {
            if !self.file_timestamps.contains_key(source) {
                violations.push(format!("{} has forward links but no timestamp", source));
            }
            for target in targets {
                if !self.backlinks(target).contains(source) {
                    violations.push(format!("edge {} -> {} has no backlink", source, target));
                }
                if self.link_details(source, target).is_empty() {
                    violations.push(format!("edge {} -> {} has no details", source, target));
                }
            }
        }

        for (target, sources) in &self.back_links {
            for source in sources {
                let has_edge = self
                    .forward_links
                    .get(source)
                    .is_some_and(|targets| targets.contains(target));
                if !has_edge {
                    violations.push(format!("backlink {} <- {} has no edge", target, source));
                }
            }
        }

        for (source, target) in self.link_details.keys() {
            let has_edge = self
                .forward_links
                .get(source)
                .is_some_and(|targets| targets.contains(target));
            if !has_edge {
                violations.push(format!("details {} -> {} without edge", source, target));
            }
        }

        violations.sort();
        violations
    }
}

/// Graph statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub documents: usize,
    /// Unique (source, target) pairs
    pub edges: usize,
    pub link_occurrences: usize,
    pub aliases: usize,
    /// Edges whose target is not an indexed document
    pub dangling_edges: usize,
}
