//! Path Filter
//!
//! Git-style ignore rules. A share root's `.gitignore` (plus configured extra
//! patterns) compiles into a [`Matcher`] that decides whether a root-relative
//! path takes part in sync at all.

pub mod loader;
pub mod matcher;
pub mod pattern;

pub use loader::{is_ignore_file, load_matcher, relative_to_ignore_dir, IGNORE_FILE};
pub use matcher::Matcher;
pub use pattern::{Pattern, PatternLine};
