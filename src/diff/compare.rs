//! Full-tree diff

use crate::diff::change::{ChangeRecord, ChangeSet};
use crate::tree::node::TreeNode;
use crate::tree::path::TreePath;
use std::collections::BTreeSet;

/// Minimal change batch turning `old` into `new`.
///
/// Children are compared by key union at each level. A key only in `new` is
/// Created, only in `old` Deleted; two files with different content, or a
/// kind change, are Modified; two directories recurse.
pub fn diff(old: &TreeNode, new: &TreeNode) -> ChangeSet {
    let mut set = ChangeSet::new();
    diff_at(&TreePath::root(), old, new, &mut set);
    set
}

fn diff_at(prefix: &TreePath, old: &TreeNode, new: &TreeNode, set: &mut ChangeSet) {
    match (old, new) {
        (TreeNode::Directory { children: before }, TreeNode::Directory { children: after }) => {
            let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
            for key in keys {
                let path = prefix.join(key);
                match (before.get(key), after.get(key)) {
                    (None, Some(node)) => set.push(ChangeRecord::created(path, node.clone())),
                    (Some(_), None) => set.push(ChangeRecord::deleted(path)),
                    (Some(a), Some(b)) => diff_at(&path, a, b, set),
                    (None, None) => {}
                }
            }
        }
        (TreeNode::File { content: a }, TreeNode::File { content: b }) => {
            if a != b && !prefix.is_root() {
                set.push(ChangeRecord::modified(prefix.clone(), new.clone()));
            }
        }
        _ => {
            if !prefix.is_root() {
                set.push(ChangeRecord::modified(prefix.clone(), new.clone()));
            }
        }
    }
}
