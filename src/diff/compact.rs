//! Compaction of raw filesystem notifications into a change tree

use crate::diff::change::{ChangeKind, ChangeRecord, ChangeSet, ChangeTree};
use crate::filter::Matcher;
use crate::tree::node::TreeNode;
use crate::tree::path::TreePath;
use std::sync::Arc;
use tracing::debug;

/// Suffixes of editor temp and swap files that never sync.
pub const DEFAULT_TRANSIENT_SUFFIXES: &[&str] = &[".crswap", ".swp", ".swx", ".tmp", "~"];

/// One observed change to a single path, as reported by a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub path: TreePath,
    pub kind: ChangeKind,
    /// New node for Created/Modified; `None` for Deleted
    pub content: Option<TreeNode>,
    /// Whether the path is (or was) a directory
    pub is_dir: bool,
}

impl RawNotification {
    pub fn upsert(path: TreePath, kind: ChangeKind, node: TreeNode) -> Self {
        let is_dir = node.is_dir();
        Self {
            path,
            kind,
            content: Some(node),
            is_dir,
        }
    }

    pub fn deleted(path: TreePath, was_dir: bool) -> Self {
        Self {
            path,
            kind: ChangeKind::Deleted,
            content: None,
            is_dir: was_dir,
        }
    }
}

/// Filters and groups notifications into one batch.
#[derive(Debug, Clone)]
pub struct Compactor {
    matcher: Arc<Matcher>,
    transient_suffixes: Vec<String>,
}

impl Compactor {
    pub fn new(matcher: Arc<Matcher>, transient_suffixes: Vec<String>) -> Self {
        Self {
            matcher,
            transient_suffixes,
        }
    }

    pub fn with_default_suffixes(matcher: Arc<Matcher>) -> Self {
        Self::new(
            matcher,
            DEFAULT_TRANSIENT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn set_matcher(&mut self, matcher: Arc<Matcher>) {
        self.matcher = matcher;
    }

    pub fn is_transient(&self, name: &str) -> bool {
        self.transient_suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }

    /// Whether a notification for `path` would survive filtering.
    pub fn accepts(&self, path: &TreePath, is_dir: bool) -> bool {
        match path.file_name() {
            None => false,
            Some(name) if self.is_transient(name) => false,
            Some(_) => !self.matcher.is_ignored_entry(path, is_dir),
        }
    }

    /// Drop transient and ignored paths, then group the rest by directory.
    /// Returns `None` when nothing survives, meaning there is nothing to publish.
    pub fn compact<I>(&self, notifications: I) -> Option<ChangeTree>
    where
        I: IntoIterator<Item = RawNotification>,
    {
        let mut set = ChangeSet::new();
        for notification in notifications {
            if !self.accepts(&notification.path, notification.is_dir) {
                debug!(path = %notification.path, "Dropping filtered notification");
                continue;
            }
            let record = match (notification.kind, notification.content) {
                (ChangeKind::Deleted, _) => ChangeRecord::deleted(notification.path),
                (kind, Some(node)) => ChangeRecord {
                    path: notification.path,
                    kind,
                    payload: Some(node),
                },
                (_, None) => {
                    debug!(path = %notification.path, "Dropping notification without content");
                    continue;
                }
            };
            set.push(record);
        }

        if set.is_empty() {
            return None;
        }
        Some(set.to_tree())
    }
}
