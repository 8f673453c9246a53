//! Ignore rules applied through snapshots and the change pipeline

use mirrorcast::diff::{ChangeKind, Compactor, RawNotification};
use mirrorcast::filter::{load_matcher, Matcher};
use mirrorcast::tree::node::TreeNode;
use mirrorcast::tree::path::TreePath;
use mirrorcast::tree::walker::Walker;
use std::sync::Arc;
use tempfile::TempDir;

use crate::integration::{file_at, write_files};

#[test]
fn test_snapshot_honours_gitignore() {
    let temp_dir = TempDir::new().unwrap();
    write_files(
        temp_dir.path(),
        &[
            (".gitignore", "node_modules/\n*.log\n!keep.log\n/build\n"),
            ("main.py", "print('hi')"),
            ("debug.log", "noise"),
            ("keep.log", "kept"),
            ("node_modules/pkg/index.js", "module.exports = 1"),
            ("build/out.txt", "artifact"),
            ("src/build/notes.md", "nested build dir is not anchored"),
            (".git/HEAD", "ref: refs/heads/main"),
        ],
    );

    let matcher = Arc::new(load_matcher(temp_dir.path(), &[]).unwrap());
    let tree = Walker::new(temp_dir.path().to_path_buf(), matcher)
        .snapshot()
        .unwrap();

    assert_eq!(file_at(&tree, "main.py"), Some("print('hi')"));
    assert_eq!(file_at(&tree, "keep.log"), Some("kept"));
    assert!(file_at(&tree, ".gitignore").is_some());
    assert!(file_at(&tree, "debug.log").is_none());
    assert!(tree.get(&TreePath::parse("node_modules")).is_none());
    assert!(tree.get(&TreePath::parse("build")).is_none());
    assert!(tree.get(&TreePath::parse(".git")).is_none());
    assert_eq!(
        file_at(&tree, "src/build/notes.md"),
        Some("nested build dir is not anchored")
    );
}

#[test]
fn test_extra_patterns_apply_before_gitignore() {
    let temp_dir = TempDir::new().unwrap();
    write_files(
        temp_dir.path(),
        &[(".gitignore", "!secrets/public.txt\n"), ("secrets/public.txt", "ok")],
    );
    let matcher = load_matcher(temp_dir.path(), &["secrets/*".to_string()]).unwrap();
    assert!(matcher.is_ignored("secrets/private.txt"));
    assert!(!matcher.is_ignored("secrets/public.txt"));
}

#[test]
fn test_compactor_and_snapshot_agree() {
    let matcher = Arc::new(Matcher::compile("target/\n*.pyc\n"));
    let compactor = Compactor::with_default_suffixes(matcher);

    let notifications = vec![
        RawNotification::upsert(TreePath::parse("target/debug/app"), ChangeKind::Created, TreeNode::file("bin")),
        RawNotification::upsert(TreePath::parse("pkg/mod.pyc"), ChangeKind::Created, TreeNode::file("x")),
        RawNotification::upsert(TreePath::parse("pkg/mod.py"), ChangeKind::Created, TreeNode::file("x = 1")),
        RawNotification::upsert(TreePath::parse("pkg/mod.py.swp"), ChangeKind::Created, TreeNode::file("")),
    ];
    let changes = compactor.compact(notifications).unwrap().flatten();
    let paths: Vec<String> = changes.paths().map(|p| p.to_string()).collect();
    assert_eq!(paths, vec!["pkg/mod.py".to_string()]);
}
