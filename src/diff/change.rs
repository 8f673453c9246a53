//! Change records and the two batch shapes: flat (path-keyed) and nested

use crate::tree::node::TreeNode;
use crate::tree::path::TreePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One path-level change. Created and Modified carry the new node; Deleted
/// carries nothing, and deleting a directory deletes everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub path: TreePath,
    pub kind: ChangeKind,
    pub payload: Option<TreeNode>,
}

impl ChangeRecord {
    pub fn created(path: TreePath, node: TreeNode) -> Self {
        Self {
            path,
            kind: ChangeKind::Created,
            payload: Some(node),
        }
    }

    pub fn modified(path: TreePath, node: TreeNode) -> Self {
        Self {
            path,
            kind: ChangeKind::Modified,
            payload: Some(node),
        }
    }

    pub fn deleted(path: TreePath) -> Self {
        Self {
            path,
            kind: ChangeKind::Deleted,
            payload: None,
        }
    }
}

/// Flat change batch keyed by full path.
///
/// Keys are unique by construction and iterate parents-first, so applying
/// records in order never touches a path before its ancestors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, WireChange>", into = "BTreeMap<String, WireChange>")]
pub struct ChangeSet {
    records: BTreeMap<TreePath, ChangeRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &TreePath) -> Option<&ChangeRecord> {
        self.records.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &TreePath> {
        self.records.keys()
    }

    /// Add a record, merging with anything already recorded for the path.
    ///
    /// Created then Modified stays Created; Created then Deleted cancels out;
    /// Deleted then Created becomes Modified. A Deleted record also drops
    /// records for paths beneath it.
    pub fn push(&mut self, record: ChangeRecord) {
        let kind = match (self.records.get(&record.path).map(|r| r.kind), record.kind) {
            (Some(ChangeKind::Created), ChangeKind::Modified) => ChangeKind::Created,
            (Some(ChangeKind::Created), ChangeKind::Deleted) => {
                self.remove_subtree(&record.path);
                return;
            }
            (Some(ChangeKind::Deleted), ChangeKind::Created) => ChangeKind::Modified,
            (_, kind) => kind,
        };

        if kind == ChangeKind::Deleted {
            self.remove_subtree(&record.path);
        }
        self.records.insert(
            record.path.clone(),
            ChangeRecord {
                path: record.path,
                kind,
                payload: record.payload,
            },
        );
    }

    /// Drop the record at `path` and any records beneath it.
    pub fn remove_subtree(&mut self, path: &TreePath) {
        self.records.retain(|p, _| !p.starts_with(path));
    }

    pub fn remove(&mut self, path: &TreePath) -> Option<ChangeRecord> {
        self.records.remove(path)
    }

    /// Mutable access to a record's payload, for pruning rejected content.
    pub fn payload_mut(&mut self, path: &TreePath) -> Option<&mut TreeNode> {
        self.records.get_mut(path)?.payload.as_mut()
    }

    /// Regroup into the nested shape.
    pub fn to_tree(&self) -> ChangeTree {
        let mut tree = ChangeTree::default();
        for record in self.records.values() {
            tree.insert(record.clone());
        }
        tree
    }
}

impl FromIterator<ChangeRecord> for ChangeSet {
    fn from_iter<T: IntoIterator<Item = ChangeRecord>>(iter: T) -> Self {
        let mut set = ChangeSet::new();
        for record in iter {
            set.push(record);
        }
        set
    }
}

impl IntoIterator for ChangeSet {
    type Item = ChangeRecord;
    type IntoIter = std::collections::btree_map::IntoValues<TreePath, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

/// Serialized form of one record: `{"type": "...", "node": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<TreeNode>,
}

impl TryFrom<BTreeMap<String, WireChange>> for ChangeSet {
    type Error = String;

    fn try_from(wire: BTreeMap<String, WireChange>) -> Result<Self, Self::Error> {
        let mut set = ChangeSet::new();
        for (raw, change) in wire {
            let path = TreePath::try_from(raw.clone())?;
            if path.is_root() {
                return Err("Change path must not be empty".to_string());
            }
            let record = match (change.kind, change.node) {
                (ChangeKind::Deleted, _) => ChangeRecord::deleted(path),
                (kind, Some(node)) => ChangeRecord {
                    path,
                    kind,
                    payload: Some(node),
                },
                (_, None) => return Err(format!("Change for {} is missing its node", raw)),
            };
            if let Some(node) = &record.payload {
                if !node.has_valid_names() {
                    return Err(format!("Change for {} contains an invalid name", raw));
                }
            }
            set.push(record);
        }
        Ok(set)
    }
}

impl From<ChangeSet> for BTreeMap<String, WireChange> {
    fn from(set: ChangeSet) -> Self {
        set.records
            .into_values()
            .map(|record| {
                (
                    record.path.to_string(),
                    WireChange {
                        kind: record.kind,
                        node: record.payload,
                    },
                )
            })
            .collect()
    }
}

/// Nested change batch shaped like the tree: directories hold only their
/// changed descendants, so siblings changed together share one parent entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeTree {
    pub entry: Option<ChangeEntry>,
    pub children: BTreeMap<String, ChangeTree>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub kind: ChangeKind,
    pub payload: Option<TreeNode>,
}

impl ChangeTree {
    pub fn is_empty(&self) -> bool {
        self.entry.is_none() && self.children.is_empty()
    }

    /// Place a record at its path, creating parent entries as needed.
    pub fn insert(&mut self, record: ChangeRecord) {
        let mut current = self;
        for segment in record.path.segments() {
            current = current.children.entry(segment.clone()).or_default();
        }
        current.entry = Some(ChangeEntry {
            kind: record.kind,
            payload: record.payload,
        });
    }

    /// Number of records in the tree.
    pub fn len(&self) -> usize {
        usize::from(self.entry.is_some()) + self.children.values().map(ChangeTree::len).sum::<usize>()
    }

    /// Flatten back into a path-keyed batch.
    pub fn flatten(&self) -> ChangeSet {
        let mut set = ChangeSet::new();
        self.collect(&TreePath::root(), &mut set);
        set
    }

    fn collect(&self, prefix: &TreePath, set: &mut ChangeSet) {
        if let Some(entry) = &self.entry {
            if !prefix.is_root() {
                set.push(ChangeRecord {
                    path: prefix.clone(),
                    kind: entry.kind,
                    payload: entry.payload.clone(),
                });
            }
        }
        for (name, child) in &self.children {
            child.collect(&prefix.join(name), set);
        }
    }
}
