//! Link-preserving document moves.
//!
//! A move renames the document in the store, rewrites every document that
//! linked to it, relabels the graph in place and re-indexes the rewritten
//! documents. Previews are computed for every move, dry run or not.

use crate::index::LinkIndex;
use crate::rewrite::{BareNames, RewriteOutcome, rebase_relative_links, update_links_with};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::sync::Arc;
use tracing::instrument;
use vaultlink_core::prelude::*;

/// How a move is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOptions {
    /// Rewrite references to the moved document
    pub update_links: bool,
    /// Compute previews only
    pub dry_run: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            update_links: true,
            dry_run: false,
        }
    }
}

impl MoveOptions {
    /// Options for a preview-only run
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// Prospective change to one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePreview {
    /// Document as it is named before the move
    pub path: DocPath,
    /// References that would be rewritten
    pub occurrences: usize,
    /// Changed lines, `-` before and `+` after
    pub diff: String,
}

/// Result of a single move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    pub old_path: DocPath,
    pub new_path: DocPath,
    pub dry_run: bool,
    pub previews: Vec<MovePreview>,
    pub files_updated: usize,
    pub links_updated: usize,
}

/// One document to rewrite as part of a move
#[derive(Debug, Clone)]
pub(crate) struct PlannedEdit {
    pub(crate) path: DocPath,
    /// Where the rewritten content goes; differs from `path` for the
    /// moved document itself
    pub(crate) write_path: DocPath,
    pub(crate) original: String,
    pub(crate) outcome: RewriteOutcome,
}

impl PlannedEdit {
    fn preview(&self) -> MovePreview {
        MovePreview {
            path: self.path.clone(),
            occurrences: self.outcome.replacements,
            diff: line_diff(&self.original, &self.outcome.content),
        }
    }
}

/// Changed lines of a rewrite
fn line_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut preview = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => continue,
        };
        preview.push_str(&format!("{} {}", sign, change));
        if change.missing_newline() {
            preview.push('\n');
        }
    }

    preview
}

/// Moves documents while keeping references to them intact
pub struct DocumentMover {
    index: Arc<LinkIndex>,
}

impl DocumentMover {
    /// Create a mover operating on `index`
    pub fn new(index: Arc<LinkIndex>) -> Self {
        Self { index }
    }

    /// Check that `old` can be moved to `new`
    pub async fn validate(&self, old: &DocPath, new: &DocPath) -> Result<()> {
        if old == new {
            return Err(Error::validation_error(format!(
                "Source and target are the same: {}",
                old
            )));
        }
        if !new.is_document() {
            return Err(Error::validation_error(format!(
                "Target is not a .{} document: {}",
                self.index.config().document_extension,
                new
            )));
        }

        let store = self.index.store();
        if !store.exists(old).await? {
            return Err(Error::validation_error(format!(
                "Source does not exist: {}",
                old
            )));
        }
        if store.exists(new).await? {
            return Err(Error::validation_error(format!(
                "Target already exists: {}",
                new
            )));
        }
        Ok(())
    }

    /// Rewrites needed to move `old` to `new`, in path order.
    ///
    /// Backlinking documents get their references updated; the moved
    /// document itself gets its relative links rebased and its self
    /// references updated. Bare names are qualified with their directory
    /// when the new name already belongs to another document.
    pub(crate) async fn plan(&self, old: &DocPath, new: &DocPath) -> Result<Vec<PlannedEdit>> {
        let store = self.index.store();
        let backlinkers = self.index.backlinks(old).await;
        let bare = BareNames::for_move(&*self.index.read().await, old, new);
        let mut edits = Vec::new();

        for source in backlinkers.iter().filter(|s| *s != old) {
            let original = store.read(source).await?;
            let outcome = update_links_with(&original, source, old, new, bare);
            if outcome.changed() {
                edits.push(PlannedEdit {
                    path: source.clone(),
                    write_path: source.clone(),
                    original,
                    outcome,
                });
            }
        }

        let original = store.read(old).await?;
        let rebased = rebase_relative_links(&original, old, new);
        let updated = update_links_with(&rebased.content, new, old, new, bare);
        if rebased.changed() || updated.changed() {
            edits.push(PlannedEdit {
                path: old.clone(),
                write_path: new.clone(),
                original,
                outcome: RewriteOutcome {
                    content: updated.content,
                    replacements: rebased.replacements + updated.replacements,
                },
            });
        }

        edits.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(edits)
    }

    /// Previews for moving `old` to `new`, without side effects
    pub async fn preview(&self, old: &DocPath, new: &DocPath) -> Result<Vec<MovePreview>> {
        Ok(self
            .plan(old, new)
            .await?
            .iter()
            .map(PlannedEdit::preview)
            .collect())
    }

    /// Put back the documents in `written` and the moved document after a
    /// live move failed part way. The graph has not been relabelled yet.
    async fn undo_partial_move(&self, old: &DocPath, new: &DocPath, written: &[PlannedEdit]) {
        let store = self.index.store();
        for edit in written.iter().rev() {
            if let Err(e) = store.write(&edit.write_path, &edit.original).await {
                log::error!("Failed to restore {} after aborted move: {}", edit.write_path, e);
            }
        }
        if let Err(e) = store.rename(new, old).await {
            log::error!("Failed to move {} back to {}: {}", new, old, e);
        }
    }

    /// Move `old` to `new`, rewriting references unless disabled.
    ///
    /// A failure while rewriting undoes the rename and the rewrites already
    /// written before the error is returned.
    #[instrument(skip(self), fields(from = %old, to = %new), name = "move_document")]
    pub async fn move_document(
        &self,
        old: &DocPath,
        new: &DocPath,
        options: MoveOptions,
    ) -> Result<MoveResult> {
        self.validate(old, new).await?;

        let plan = self.plan(old, new).await?;
        let previews: Vec<MovePreview> = plan.iter().map(PlannedEdit::preview).collect();

        if options.dry_run {
            log::debug!("Dry run: move {} -> {} touches {} documents", old, new, plan.len());
            return Ok(MoveResult {
                old_path: old.clone(),
                new_path: new.clone(),
                dry_run: true,
                previews,
                files_updated: 0,
                links_updated: 0,
            });
        }

        let store = self.index.store();
        store.rename(old, new).await?;

        let mut files_updated = 0;
        let mut links_updated = 0;
        if options.update_links {
            for (done, edit) in plan.iter().enumerate() {
                if let Err(e) = store.write(&edit.write_path, &edit.outcome.content).await {
                    log::warn!("Move {} -> {} failed at {}: {}", old, new, edit.write_path, e);
                    self.undo_partial_move(old, new, &plan[..done]).await;
                    return Err(e);
                }
                files_updated += 1;
                links_updated += edit.outcome.replacements;
            }
        }

        self.index.write().await.rename_path(old, new);
        if options.update_links {
            for edit in &plan {
                self.index.update_file_links(&edit.write_path).await?;
            }
        }
        self.index.save_after_mutation().await?;

        log::info!(
            "Moved {} -> {} ({} links in {} documents)",
            old,
            new,
            links_updated,
            files_updated
        );

        Ok(MoveResult {
            old_path: old.clone(),
            new_path: new.clone(),
            dry_run: false,
            previews,
            files_updated,
            links_updated,
        })
    }
}
