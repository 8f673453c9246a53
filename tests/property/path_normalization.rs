//! Property-based tests for path normalization

use mirrorcast::tree::path::{normalize_path_string, TreePath};
use proptest::prelude::*;

/// Normalizing an already normalized path changes nothing
#[test]
fn test_normalization_is_idempotent() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&"(\\./)*[a-z]{1,4}([/\\\\][a-z]{1,4}){0,4}[/\\\\]?", |path| {
            let once = normalize_path_string(&path);
            let twice = normalize_path_string(&once);
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.starts_with('/'));
            prop_assert!(!once.ends_with('/'));
            prop_assert!(!once.contains('\\'));
            Ok(())
        })
        .unwrap();
}

/// Parsing and printing a tree path is stable
#[test]
fn test_tree_path_display_reparses() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec("[a-z0-9_]{1,6}", 0..5), |segments| {
            let path = TreePath::from_segments(segments.iter().map(String::as_str));
            let reparsed = TreePath::parse(&path.to_string());
            prop_assert_eq!(reparsed, path);
            Ok(())
        })
        .unwrap();
}
