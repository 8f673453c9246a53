//! Tree nodes: the recursive file/directory value mirrored between peers

use crate::tree::path::{is_valid_segment, TreePath};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A file or a directory of named children.
///
/// Serialized as `{"kind":"file","data":..}` or
/// `{"kind":"directory","children":{..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    File {
        #[serde(rename = "data", default)]
        content: String,
    },
    Directory {
        #[serde(default, deserialize_with = "deserialize_children")]
        children: BTreeMap<String, TreeNode>,
    },
}

/// Child names are NFC-normalized so they line up with [`TreePath`] segments.
fn nfc(name: &str) -> String {
    name.nfc().collect()
}

fn deserialize_children<'de, D>(deserializer: D) -> Result<BTreeMap<String, TreeNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, TreeNode>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(name, node)| (nfc(&name), node)).collect())
}

impl Default for TreeNode {
    fn default() -> Self {
        TreeNode::empty_dir()
    }
}

impl TreeNode {
    pub fn empty_dir() -> Self {
        TreeNode::Directory {
            children: BTreeMap::new(),
        }
    }

    pub fn file(content: impl Into<String>) -> Self {
        TreeNode::File {
            content: content.into(),
        }
    }

    /// Build a directory from `(name, node)` pairs. Names are stored in NFC.
    pub fn dir<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, TreeNode)>,
        S: AsRef<str>,
    {
        TreeNode::Directory {
            children: entries
                .into_iter()
                .map(|(k, v)| (nfc(k.as_ref()), v))
                .collect(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            TreeNode::File { .. } => EntryKind::File,
            TreeNode::Directory { .. } => EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, TreeNode::File { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            TreeNode::File { content } => Some(content),
            TreeNode::Directory { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, TreeNode>> {
        match self {
            TreeNode::Directory { children } => Some(children),
            TreeNode::File { .. } => None,
        }
    }

    /// Look up the node at `path`. The root path returns `self`.
    pub fn get(&self, path: &TreePath) -> Option<&TreeNode> {
        let mut current = self;
        for segment in path.segments() {
            current = current.children()?.get(segment)?;
        }
        Some(current)
    }

    /// Place `node` at `path`, creating intermediate directories. A file
    /// standing where a directory is needed is replaced by a directory.
    /// Returns the previous node at `path`, if any.
    pub fn insert(&mut self, path: &TreePath, node: TreeNode) -> Option<TreeNode> {
        let Some((last, parents)) = path.segments().split_last() else {
            return Some(std::mem::replace(self, node));
        };
        let mut current = self;
        for segment in parents {
            let children = current.ensure_dir();
            current = children
                .entry(segment.clone())
                .or_insert_with(TreeNode::empty_dir);
        }
        current.ensure_dir().insert(last.clone(), node)
    }

    /// Remove and return the node at `path`. Removing the root is a no-op.
    pub fn remove(&mut self, path: &TreePath) -> Option<TreeNode> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for segment in parents {
            current = match current {
                TreeNode::Directory { children } => children.get_mut(segment)?,
                TreeNode::File { .. } => return None,
            };
        }
        match current {
            TreeNode::Directory { children } => children.remove(last),
            TreeNode::File { .. } => None,
        }
    }

    /// Every file beneath this node as `(path relative to this node, content)`,
    /// in path order.
    pub fn files(&self) -> Vec<(TreePath, &str)> {
        let mut out = Vec::new();
        self.collect_files(&TreePath::root(), &mut out);
        out
    }

    fn collect_files<'a>(&'a self, prefix: &TreePath, out: &mut Vec<(TreePath, &'a str)>) {
        match self {
            TreeNode::File { content } => out.push((prefix.clone(), content)),
            TreeNode::Directory { children } => {
                for (name, child) in children {
                    child.collect_files(&prefix.join(name), out);
                }
            }
        }
    }

    pub fn file_count(&self) -> usize {
        match self {
            TreeNode::File { .. } => 1,
            TreeNode::Directory { children } => children.values().map(TreeNode::file_count).sum(),
        }
    }

    /// Total content size in bytes.
    pub fn total_size(&self) -> u64 {
        match self {
            TreeNode::File { content } => content.len() as u64,
            TreeNode::Directory { children } => children.values().map(TreeNode::total_size).sum(),
        }
    }

    /// True when every child name in the tree is a plain, safe segment.
    pub fn has_valid_names(&self) -> bool {
        match self {
            TreeNode::File { .. } => true,
            TreeNode::Directory { children } => children
                .iter()
                .all(|(name, child)| is_valid_segment(name) && child.has_valid_names()),
        }
    }

    fn ensure_dir(&mut self) -> &mut BTreeMap<String, TreeNode> {
        if self.is_file() {
            *self = TreeNode::empty_dir();
        }
        match self {
            TreeNode::Directory { children } => children,
            TreeNode::File { .. } => unreachable!("replaced by a directory above"),
        }
    }
}
