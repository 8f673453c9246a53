//! File Tree Model
//!
//! The recursive file/directory value that producers publish and viewers
//! mirror, the root-relative paths that address it, and the walker that
//! snapshots a directory on disk.

pub mod node;
pub mod path;
pub mod walker;
