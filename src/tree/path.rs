//! Root-relative tree paths and path-string normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// A root-relative path, stored as its segments.
///
/// Ordering is segment-wise, so a directory always sorts before anything
/// beneath it. Change batches rely on that to apply parents first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The tree root (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from already-split segments. Empty and `.` segments are dropped.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .map(|s| s.as_ref().nfc().collect::<String>())
            .filter(|s| !s.is_empty() && s != ".")
            .collect();
        Self { segments }
    }

    /// Parse a `/`- or `\`-separated path string.
    pub fn parse(path: &str) -> Self {
        let normalized = normalize_path_string(path);
        Self::from_segments(normalized.split('/'))
    }

    /// Express `path` relative to `root`. Returns `None` when `path` is not under `root`.
    pub fn from_relative(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(Self::from_segments(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<TreePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn join(&self, segment: &str) -> TreePath {
        let mut segments = self.segments.clone();
        segments.push(segment.nfc().collect());
        Self { segments }
    }

    /// Append all of `other`'s segments.
    pub fn concat(&self, other: &TreePath) -> TreePath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// True when `self` equals `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &TreePath) -> bool {
        self.segments.len() >= ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }

    /// Strict ancestors, nearest last (`a`, `a/b` for `a/b/c`).
    pub fn ancestors(&self) -> impl Iterator<Item = TreePath> + '_ {
        (1..self.segments.len()).map(move |n| Self {
            segments: self.segments[..n].to_vec(),
        })
    }

    /// Resolve against a filesystem root.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }

    /// True when every segment is a plain name that cannot escape the root.
    pub fn is_safe(&self) -> bool {
        self.segments.iter().all(|s| is_valid_segment(s))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for TreePath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let path = TreePath::parse(&value);
        if !path.is_safe() {
            return Err(format!("Invalid path: {}", value));
        }
        Ok(path)
    }
}

/// A child name is valid when it is non-empty, not `.`/`..`, and has no separator.
pub fn is_valid_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Normalize a path string without filesystem access.
///
/// Forces `/` separators, normalizes Unicode to NFC, and strips leading `./`
/// plus leading and trailing slashes, so the result is root-relative.
pub fn normalize_path_string(path: &str) -> String {
    let normalized: String = path.nfc().collect::<String>().replace('\\', "/");
    let mut result = normalized.as_str();
    while let Some(rest) = result.strip_prefix("./") {
        result = rest;
    }
    result.trim_matches('/').to_string()
}

/// Canonicalize a directory for use as a share root.
pub fn canonicalize_root(path: &Path) -> Result<PathBuf, crate::error::ApiError> {
    dunce::canonicalize(path).map_err(|e| {
        crate::error::ApiError::Validation(format!(
            "Failed to resolve directory {}: {}",
            path.display(),
            e
        ))
    })
}
