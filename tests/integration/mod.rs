//! Integration tests for the Mirrorcast live mirroring system

mod broadcast_isolation;
mod config_layering;
mod end_to_end;
mod http_api;
mod path_filter;
mod session_quota;
mod test_utils;
mod tree_sync;

pub use test_utils::*;
