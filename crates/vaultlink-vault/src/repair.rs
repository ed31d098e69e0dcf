//! Broken link repair.
//!
//! Detection lives in the graph crate; this module applies accepted
//! suggestions to document content and re-indexes what it touched.

use crate::index::LinkIndex;
use crate::rewrite::splice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use vaultlink_core::prelude::*;
use vaultlink_graph::{BrokenLink, BrokenLinkDetector, GraphStore, Suggestion};
use vaultlink_parser::parsers::link_utils::has_document_extension;
use vaultlink_parser::scan_references;

/// Decides whether a suggested repair is applied
pub trait FixApprover: Send + Sync {
    fn approve(&self, broken: &BrokenLink, suggestion: &Suggestion) -> bool;
}

/// Approves every suggestion
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FixApprover for AcceptAll {
    fn approve(&self, _broken: &BrokenLink, _suggestion: &Suggestion) -> bool {
        true
    }
}

impl<F> FixApprover for F
where
    F: Fn(&BrokenLink, &Suggestion) -> bool + Send + Sync,
{
    fn approve(&self, broken: &BrokenLink, suggestion: &Suggestion) -> bool {
        self(broken, suggestion)
    }
}

/// Outcome of a check-and-fix pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Broken edges found
    pub broken: usize,
    /// Edges repaired
    pub fixed: usize,
    /// Edges left as they were (no suggestion, rejected, or not fixing)
    pub skipped: usize,
    pub files_modified: Vec<DocPath>,
}

/// Replacement text for one raw reference pointing at `suggestion`
fn repaired_reference(
    graph: &GraphStore,
    source: &DocPath,
    raw: &str,
    suggestion: &DocPath,
) -> Option<String> {
    let references = scan_references(raw);
    let reference = references.first()?;

    let target = match reference.kind {
        LinkKind::Bracket | LinkKind::Embed => {
            let ambiguous = graph.documents_with_stem(suggestion.stem()).count() > 1;
            let mut target = if reference.target.contains('/') || ambiguous {
                suggestion.without_extension().to_string()
            } else {
                suggestion.stem().to_string()
            };
            if has_document_extension(reference.target) {
                target.push('.');
                target.push_str(DOCUMENT_EXTENSION);
            }
            target
        }
        LinkKind::Path => {
            if reference.target.starts_with('/') {
                format!("/{}", suggestion)
            } else {
                suggestion.relative_from_dir(source.parent())
            }
        }
    };

    Some(reference.render_with_target(&target))
}

/// Finds and repairs broken links across a vault
pub struct LinkRepairer {
    index: Arc<LinkIndex>,
}

impl LinkRepairer {
    pub fn new(index: Arc<LinkIndex>) -> Self {
        Self { index }
    }

    /// Every broken edge with its repair suggestion
    pub async fn find_broken_links(&self) -> Vec<BrokenLink> {
        let graph = self.index.read().await;
        BrokenLinkDetector::new(&graph).find_broken_links()
    }

    /// Report broken links and, when `fix` is set, rewrite the occurrences
    /// of every edge whose suggestion `approver` accepts.
    #[instrument(skip(self, approver), name = "check_and_fix_broken_links")]
    pub async fn check_and_fix_broken_links(
        &self,
        fix: bool,
        approver: &dyn FixApprover,
    ) -> Result<RepairReport> {
        let broken = self.find_broken_links().await;
        let mut report = RepairReport {
            broken: broken.len(),
            ..RepairReport::default()
        };

        // source -> (offset, old raw, new raw) per occurrence
        let mut replacements: BTreeMap<DocPath, Vec<(usize, String, String)>> = BTreeMap::new();
        {
            let graph = self.index.read().await;
            for item in &broken {
                let Some(suggestion) = item.suggestion.as_ref() else {
                    report.skipped += 1;
                    continue;
                };
                if !fix || !approver.approve(item, suggestion) {
                    report.skipped += 1;
                    continue;
                }

                let edits = replacements.entry(item.source.clone()).or_default();
                for link in &item.links {
                    if let Some(new) =
                        repaired_reference(&graph, &item.source, &link.raw, &suggestion.path)
                    {
                        edits.push((link.position.offset, link.raw.clone(), new));
                    }
                }
                report.fixed += 1;
                log::info!(
                    "Repairing {} -> {} in {} (similarity {:.2})",
                    item.target,
                    suggestion.path,
                    item.source,
                    suggestion.score
                );
            }
        }

        let store = self.index.store();
        for (source, edits) in replacements {
            let original = store.read(&source).await?;
            // Only occurrences still where the index saw them are rewritten
            let spans = scan_references(&original)
                .into_iter()
                .filter_map(|reference| {
                    let raw = reference.raw(&original);
                    edits
                        .iter()
                        .find(|(offset, old, _)| *offset == reference.span.start && old == raw)
                        .map(|(_, _, new)| (reference.span.clone(), new.clone()))
                })
                .collect();
            let outcome = splice(&original, spans);
            if !outcome.changed() {
                continue;
            }

            store.write(&source, &outcome.content).await?;
            self.index.update_file_links(&source).await?;
            report.files_modified.push(source);
        }

        if !report.files_modified.is_empty() {
            self.index.save_after_mutation().await?;
        }

        log::info!(
            "Broken links: {} found, {} fixed, {} skipped",
            report.broken,
            report.fixed,
            report.skipped
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(path: &str) -> DocPath {
        DocPath::new(path).unwrap()
    }

    async fn setup(files: &[(&str, &str)]) -> (Arc<LinkIndex>, LinkRepairer, TempDir) {
        let temp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = temp.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let config = EngineConfig::builder(temp.path()).build().unwrap();
        let index = Arc::new(LinkIndex::with_fs_store(config));
        index.build_index().await.unwrap();
        (index.clone(), LinkRepairer::new(index), temp)
    }

    #[tokio::test]
    async fn test_suggestion_for_typo() {
        let (_index, repairer, _temp) = setup(&[
            ("Daily.md", "[[Projcet Plan]]"),
            ("Project Plan.md", ""),
        ])
        .await;

        let broken = repairer.find_broken_links().await;
        assert_eq!(broken.len(), 1);
        let suggestion = broken[0].suggestion.as_ref().unwrap();
        assert_eq!(suggestion.path, doc("Project Plan.md"));
        assert!(suggestion.score > 0.7);
    }

    #[tokio::test]
    async fn test_fix_rewrites_all_occurrences() {
        let (index, repairer, temp) = setup(&[
            ("notes/Daily.md", "[[Projcet Plan|plan]] and ![[Projcet Plan#Goals]] [x](../Projcet%20Plan.md)"),
            ("Project Plan.md", ""),
            ("Other.md", "[[Zzzzzz]]"),
        ])
        .await;

        let report = repairer
            .check_and_fix_broken_links(true, &AcceptAll)
            .await
            .unwrap();

        assert_eq!(report.broken, 2);
        assert_eq!(report.fixed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.files_modified, vec![doc("notes/Daily.md")]);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("notes/Daily.md")).unwrap(),
            "[[Project Plan|plan]] and ![[Project Plan#Goals]] [x](../Project%20Plan.md)"
        );

        assert_eq!(
            index.backlinks(&doc("Project Plan.md")).await,
            vec![doc("notes/Daily.md")]
        );
        assert_eq!(repairer.find_broken_links().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_and_report_only() {
        let (_index, repairer, temp) = setup(&[
            ("Daily.md", "[[Projcet Plan]]"),
            ("Project Plan.md", ""),
        ])
        .await;

        let reject = |_: &BrokenLink, _: &Suggestion| false;
        let report = repairer.check_and_fix_broken_links(true, &reject).await.unwrap();
        assert_eq!((report.fixed, report.skipped), (0, 1));

        let report = repairer
            .check_and_fix_broken_links(false, &AcceptAll)
            .await
            .unwrap();
        assert_eq!((report.fixed, report.skipped), (0, 1));
        assert!(report.files_modified.is_empty());
        assert_eq!(
            std::fs::read_to_string(temp.path().join("Daily.md")).unwrap(),
            "[[Projcet Plan]]"
        );
    }

    #[tokio::test]
    async fn test_fix_leaves_code_blocks_alone() {
        let (_index, repairer, temp) = setup(&[
            (
                "Daily.md",
                "[[Projcet Plan]]\n```\nexample: [[Projcet Plan]]\n```\nSee `[[Projcet Plan]]` and x[[Projcet Plan]]",
            ),
            ("Project Plan.md", ""),
        ])
        .await;

        let report = repairer
            .check_and_fix_broken_links(true, &AcceptAll)
            .await
            .unwrap();

        assert_eq!(report.fixed, 1);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("Daily.md")).unwrap(),
            "[[Project Plan]]\n```\nexample: [[Projcet Plan]]\n```\nSee `[[Projcet Plan]]` and x[[Project Plan]]"
        );
        assert!(repairer.find_broken_links().await.is_empty());
    }
}
