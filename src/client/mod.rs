//! Clients
//!
//! [`SyncClient`] speaks the HTTP API. [`ShareDaemon`] watches a directory
//! and publishes it as a session owner; [`Viewer`] follows a session into a
//! local mirror.

pub mod http;
pub mod share;
pub mod view;

pub use http::{EventStream, SyncClient};
pub use share::{Batcher, ShareDaemon, ShareOptions, ShareSummary};
pub use view::{ViewFlow, ViewOptions, ViewSummary, Viewer};
