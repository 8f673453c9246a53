//! Applying change batches to a tree

use crate::diff::change::{ChangeKind, ChangeRecord, ChangeSet};
use crate::tree::node::TreeNode;

/// Apply one record. Created and Modified place the payload (creating parent
/// directories, replacing a file that stands in the way); Deleted removes the
/// entry and everything beneath it. A record without a payload that is not a
/// delete is ignored.
pub fn apply_change(tree: &mut TreeNode, record: &ChangeRecord) {
    if record.path.is_root() {
        return;
    }
    match record.kind {
        ChangeKind::Created | ChangeKind::Modified => {
            if let Some(node) = &record.payload {
                tree.insert(&record.path, node.clone());
            }
        }
        ChangeKind::Deleted => {
            tree.remove(&record.path);
        }
    }
}

/// Apply a whole batch in path order. Siblings not named in the batch are untouched.
pub fn apply_changes(tree: &mut TreeNode, changes: &ChangeSet) {
    for record in changes.iter() {
        apply_change(tree, record);
    }
}
