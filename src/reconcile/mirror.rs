//! Consumer-side mirror of a session's tree

use crate::diff::{apply_changes, ChangeSet};
use crate::protocol::{BroadcastEnvelope, EnvelopePayload};
use crate::tree::node::TreeNode;
use crate::tree::path::TreePath;
use std::collections::BTreeSet;
use tracing::debug;

/// The file a consumer is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewedFile {
    pub path: TreePath,
    pub content: String,
}

/// What happened to the viewed file after an envelope was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    /// Nothing viewed, or the viewed file's content did not change
    Unchanged,
    /// The viewed file still exists and its content was refreshed
    Refreshed,
    /// The viewed file disappeared; nothing is viewed any more
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The whole tree was replaced by a snapshot
    pub replaced: bool,
    /// Number of change records applied (zero for snapshots)
    pub applied: usize,
    pub view: ViewUpdate,
}

/// A local copy of the producer's tree plus the consumer's view state.
///
/// The viewed file and the set of expanded directories survive every patch
/// and snapshot for as long as the paths they name still exist.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    root: TreeNode,
    viewed: Option<ViewedFile>,
    expanded: BTreeSet<TreePath>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &TreeNode {
        &self.root
    }

    pub fn viewed(&self) -> Option<&ViewedFile> {
        self.viewed.as_ref()
    }

    pub fn expanded(&self) -> impl Iterator<Item = &TreePath> {
        self.expanded.iter()
    }

    pub fn is_expanded(&self, path: &TreePath) -> bool {
        self.expanded.contains(path)
    }

    /// Apply one received envelope.
    pub fn apply_envelope(&mut self, envelope: &BroadcastEnvelope) -> ReconcileOutcome {
        match &envelope.payload {
            EnvelopePayload::Snapshot(tree) => self.replace(tree.clone()),
            EnvelopePayload::Changes(changes) => self.apply(changes),
        }
    }

    /// Replace the mirror wholesale.
    pub fn replace(&mut self, tree: TreeNode) -> ReconcileOutcome {
        self.root = tree;
        debug!(files = self.root.file_count(), "Mirror replaced");
        ReconcileOutcome {
            replaced: true,
            applied: 0,
            view: self.refresh_view(),
        }
    }

    /// Patch the mirror. Paths not named in `changes` are left alone.
    pub fn apply(&mut self, changes: &ChangeSet) -> ReconcileOutcome {
        apply_changes(&mut self.root, changes);
        debug!(records = changes.len(), "Mirror patched");
        ReconcileOutcome {
            replaced: false,
            applied: changes.len(),
            view: self.refresh_view(),
        }
    }

    /// Start viewing a file. Returns its content, or `None` if there is no
    /// file at `path` (the previous view is kept in that case).
    pub fn view(&mut self, path: &TreePath) -> Option<&str> {
        let content = self.root.get(path)?.content()?.to_string();
        self.viewed = Some(ViewedFile {
            path: path.clone(),
            content,
        });
        self.viewed.as_ref().map(|v| v.content.as_str())
    }

    pub fn clear_view(&mut self) {
        self.viewed = None;
    }

    /// Mark a directory expanded. Returns false if `path` is not a directory.
    pub fn expand(&mut self, path: &TreePath) -> bool {
        if self.root.get(path).map_or(false, TreeNode::is_dir) {
            self.expanded.insert(path.clone());
            true
        } else {
            false
        }
    }

    pub fn collapse(&mut self, path: &TreePath) {
        self.expanded.remove(path);
    }

    fn refresh_view(&mut self) -> ViewUpdate {
        let root = &self.root;
        self.expanded
            .retain(|path| root.get(path).map_or(false, TreeNode::is_dir));

        let Some(viewed) = self.viewed.as_mut() else {
            return ViewUpdate::Unchanged;
        };
        match root.get(&viewed.path).and_then(TreeNode::content) {
            Some(content) if content == viewed.content => ViewUpdate::Unchanged,
            Some(content) => {
                viewed.content = content.to_string();
                ViewUpdate::Refreshed
            }
            None => {
                self.viewed = None;
                ViewUpdate::Cleared
            }
        }
    }
}
