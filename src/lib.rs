//! Mirrorcast: Live Directory Mirroring
//!
//! One owner mirrors a local file tree to any number of viewers, scoped to an
//! isolated session. The pipeline is incremental end to end: ignore rules
//! decide which paths participate, change sets carry only what moved, the
//! broadcast hub keeps the latest state per session, and viewers reconcile
//! patches into a local mirror.

pub mod broadcast;
pub mod cli;
pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod logging;
pub mod protocol;
pub mod reconcile;
pub mod server;
pub mod service;
pub mod session;
pub mod tree;
pub mod types;
