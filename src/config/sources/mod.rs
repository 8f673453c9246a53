//! Configuration sources, in merge order.

pub mod env;
pub mod global_file;
pub mod workspace_file;
