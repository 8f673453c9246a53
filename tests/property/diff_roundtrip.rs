//! Property-based tests for diff and patch application

use mirrorcast::diff::{apply_changes, diff, ChangeSet};
use mirrorcast::tree::node::TreeNode;
use proptest::prelude::*;

/// Names sometimes carry a decomposed accent, which trees store in NFC.
fn name() -> impl Strategy<Value = String> {
    "[a-z]{1,3}\u{301}?(\\.[a-z]{1,2})?"
}

fn node() -> impl Strategy<Value = TreeNode> {
    let leaf = "[a-z0-9 ]{0,6}".prop_map(TreeNode::file);
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop::collection::btree_map(name(), inner, 0..4).prop_map(TreeNode::dir)
    })
}

fn root() -> impl Strategy<Value = TreeNode> {
    prop::collection::btree_map(name(), node(), 0..5).prop_map(TreeNode::dir)
}

proptest! {
    #[test]
    fn patch_turns_old_into_new(old in root(), new in root()) {
        let changes = diff(&old, &new);
        let mut patched = old.clone();
        apply_changes(&mut patched, &changes);
        prop_assert_eq!(patched, new);
    }

    #[test]
    fn patch_is_idempotent(old in root(), new in root()) {
        let changes = diff(&old, &new);
        let mut once = old.clone();
        apply_changes(&mut once, &changes);
        let mut twice = once.clone();
        apply_changes(&mut twice, &changes);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn diff_of_equal_trees_is_empty(tree in root()) {
        prop_assert!(diff(&tree, &tree).is_empty());
    }

    #[test]
    fn change_sets_survive_the_wire(old in root(), new in root()) {
        let changes = diff(&old, &new);
        let json = serde_json::to_string(&changes).unwrap();
        let decoded: ChangeSet = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(decoded, changes);
    }
}
