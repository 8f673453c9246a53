//! Tree Reconciler
//!
//! Applies received envelopes to a local [`Mirror`] and, optionally, keeps a
//! directory on disk in step with it.

pub mod materialize;
pub mod mirror;

pub use materialize::{MaterializeReport, Materializer};
pub use mirror::{Mirror, ReconcileOutcome, ViewUpdate, ViewedFile};
