//! Writing a mirror to disk

use crate::diff::{diff, ChangeKind};
use crate::error::ApiError;
use crate::tree::node::TreeNode;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub written: usize,
    pub removed: usize,
}

/// Keeps a directory on disk in step with a mirror.
///
/// Only the difference from the previously written tree is touched. Files
/// already in the output directory that never appeared in the mirror are
/// left alone.
pub struct Materializer {
    root: PathBuf,
    last: TreeNode,
}

impl Materializer {
    pub fn new(root: PathBuf) -> Result<Self, ApiError> {
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            last: TreeNode::empty_dir(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bring the output directory in line with `tree`.
    pub fn sync(&mut self, tree: &TreeNode) -> Result<MaterializeReport, ApiError> {
        let changes = diff(&self.last, tree);
        let mut report = MaterializeReport::default();

        for record in changes.iter() {
            if !record.path.is_safe() {
                warn!(path = %record.path, "Refusing to materialize unsafe path");
                continue;
            }
            let target = record.path.to_fs_path(&self.root);
            match (&record.kind, &record.payload) {
                (ChangeKind::Deleted, _) => {
                    remove_entry(&target)?;
                    report.removed += 1;
                }
                (_, Some(node)) => {
                    if !node.has_valid_names() {
                        warn!(path = %record.path, "Refusing to materialize invalid names");
                        continue;
                    }
                    clear_file_ancestors(&self.root, &target)?;
                    report.written += write_node(&target, node)?;
                }
                (_, None) => {}
            }
        }

        self.last = tree.clone();
        debug!(
            root = %self.root.display(),
            written = report.written,
            removed = report.removed,
            "Materialized mirror"
        );
        Ok(report)
    }
}

/// Write `node` at `target`, replacing whatever kind of entry is there.
/// Returns the number of files written.
fn write_node(target: &Path, node: &TreeNode) -> Result<usize, ApiError> {
    match node {
        TreeNode::File { content } => {
            if target.is_dir() {
                fs::remove_dir_all(target)?;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content)?;
            Ok(1)
        }
        TreeNode::Directory { children } => {
            if target.is_file() {
                fs::remove_file(target)?;
            }
            fs::create_dir_all(target)?;
            let mut written = 0;
            for (name, child) in children {
                written += write_node(&target.join(name), child)?;
            }
            Ok(written)
        }
    }
}

/// A file standing where a parent directory is needed gets removed.
fn clear_file_ancestors(root: &Path, target: &Path) -> Result<(), ApiError> {
    let mut current = target.parent();
    let mut blocking = Vec::new();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if dir.is_file() {
            blocking.push(dir.to_path_buf());
        }
        current = dir.parent();
    }
    for path in blocking {
        fs::remove_file(&path)?;
    }
    Ok(())
}

fn remove_entry(target: &Path) -> Result<(), ApiError> {
    let result = if target.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
