//! Compiled ignore rules with last-match-wins evaluation

use crate::filter::pattern::{Pattern, PatternLine};
use crate::tree::path::{normalize_path_string, TreePath};
use tracing::warn;

/// Pattern appended after every user pattern, so `.git` stays out of sync.
const IMPLICIT_PATTERN: &str = ".git";

/// An ordered list of compiled patterns.
#[derive(Debug, Clone)]
pub struct Matcher {
    patterns: Vec<Pattern>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::compile("")
    }
}

impl Matcher {
    /// Compile ignore-file text. Lines that fail to translate are logged and skipped.
    pub fn compile(text: &str) -> Self {
        let mut patterns = Vec::new();
        for line in text.lines().chain(std::iter::once(IMPLICIT_PATTERN)) {
            let Some(parsed) = PatternLine::parse(line) else {
                continue;
            };
            match Pattern::compile(&parsed) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => warn!(pattern = line, error = %e, "Skipping invalid ignore pattern"),
            }
        }
        Self { patterns }
    }

    /// Matcher with no user patterns (only the implicit `.git` rule).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when some pattern re-includes paths. Directory pruning is only
    /// safe when this is false.
    pub fn has_negations(&self) -> bool {
        self.patterns.iter().any(Pattern::is_negation)
    }

    /// Decide a root-relative path string. A trailing `/` marks a directory.
    pub fn is_ignored(&self, path: &str) -> bool {
        let is_dir = path.ends_with('/') || path.ends_with('\\');
        let normalized = normalize_path_string(path);
        self.evaluate(&normalized, is_dir)
    }

    pub fn is_ignored_entry(&self, path: &TreePath, is_dir: bool) -> bool {
        self.evaluate(&path.to_string(), is_dir)
    }

    /// Every pattern is tried in order; the last one that matches decides.
    fn evaluate(&self, path: &str, is_dir: bool) -> bool {
        if path.is_empty() {
            return false;
        }
        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.matches(path, is_dir) {
                ignored = !pattern.is_negation();
            }
        }
        ignored
    }

    /// The pattern that decided `path`, for diagnostics.
    pub fn deciding_pattern(&self, path: &str) -> Option<&Pattern> {
        let is_dir = path.ends_with('/');
        let normalized = normalize_path_string(path);
        self.patterns
            .iter()
            .rev()
            .find(|p| p.matches(&normalized, is_dir))
    }
}
