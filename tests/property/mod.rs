//! Property-based tests for tree diffing and path handling

mod diff_roundtrip;
mod path_normalization;
