//! Filesystem walker that builds a filtered tree snapshot of a share root

use crate::error::ApiError;
use crate::filter::Matcher;
use crate::tree::node::TreeNode;
use crate::tree::path::TreePath;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Snapshot walker configuration
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Whether to follow symbolic links (default: false)
    pub follow_symlinks: bool,
    /// Files larger than this are left out of the snapshot (None = no limit)
    pub max_file_size: Option<u64>,
    /// Maximum depth to traverse (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            max_file_size: None,
            max_depth: None,
        }
    }
}

/// Walks a directory and produces a [`TreeNode`] of everything the ignore
/// matcher lets through.
pub struct Walker {
    root: PathBuf,
    matcher: Arc<Matcher>,
    config: WalkerConfig,
}

impl Walker {
    pub fn new(root: PathBuf, matcher: Arc<Matcher>) -> Self {
        Self {
            root,
            matcher,
            config: WalkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WalkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot the whole root.
    pub fn snapshot(&self) -> Result<TreeNode, ApiError> {
        self.snapshot_at(&self.root)
    }

    /// Snapshot the subtree at `start` (which must lie under the root). A file
    /// yields a file node; a directory yields its filtered contents.
    pub fn snapshot_at(&self, start: &Path) -> Result<TreeNode, ApiError> {
        if start.is_file() {
            return Ok(TreeNode::file(read_text(start)?));
        }

        let mut tree = TreeNode::empty_dir();
        let Some(base) = TreePath::from_relative(&self.root, start) else {
            return Err(ApiError::Validation(format!(
                "{} is outside the share root",
                start.display()
            )));
        };

        // Ignored directories are pruned unless a negation could re-include
        // something beneath them.
        let can_prune = !self.matcher.has_negations();
        let walker = WalkDir::new(start)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.config.max_depth.unwrap_or(usize::MAX))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                match TreePath::from_relative(&self.root, entry.path()) {
                    Some(path) if path.is_root() => true,
                    Some(path) => {
                        let is_dir = entry.file_type().is_dir();
                        !(is_dir && can_prune && self.matcher.is_ignored_entry(&path, true))
                    }
                    None => false,
                }
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                ApiError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk directory: {}", e),
                ))
            })?;
            let Some(path) = TreePath::from_relative(&self.root, entry.path()) else {
                continue;
            };
            let Some(relative) = strip_base(&path, &base) else {
                continue;
            };
            if relative.is_root() {
                continue;
            }

            let file_type = entry.file_type();
            if self.matcher.is_ignored_entry(&path, file_type.is_dir()) {
                continue;
            }
            if file_type.is_dir() {
                if tree.get(&relative).is_none() {
                    tree.insert(&relative, TreeNode::empty_dir());
                }
            } else if file_type.is_file() {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if let Some(max) = self.config.max_file_size {
                    if size > max {
                        warn!(path = %path, size, max, "Skipping file larger than the size limit");
                        continue;
                    }
                }
                match read_text(entry.path()) {
                    Ok(content) => {
                        tree.insert(&relative, TreeNode::file(content));
                    }
                    Err(e) => warn!(path = %path, error = %e, "Skipping unreadable file"),
                }
            }
            // Symlinks are skipped unless followed
        }

        debug!(
            root = %start.display(),
            files = tree.file_count(),
            bytes = tree.total_size(),
            "Built snapshot"
        );
        Ok(tree)
    }
}

fn strip_base(path: &TreePath, base: &TreePath) -> Option<TreePath> {
    if !path.starts_with(base) {
        return None;
    }
    Some(TreePath::from_segments(&path.segments()[base.len()..]))
}

/// Read a file as text. Invalid UTF-8 is replaced rather than rejected.
pub fn read_text(path: &Path) -> Result<String, ApiError> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
