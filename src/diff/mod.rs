//! Tree Differ
//!
//! Change records, the flat and nested batch shapes, full-tree diffing,
//! compaction of raw watcher notifications, and patch application.

pub mod apply;
pub mod change;
pub mod compact;
pub mod compare;

pub use apply::{apply_change, apply_changes};
pub use change::{ChangeEntry, ChangeKind, ChangeRecord, ChangeSet, ChangeTree, WireChange};
pub use compact::{Compactor, RawNotification, DEFAULT_TRANSIENT_SUFFIXES};
pub use compare::diff;
