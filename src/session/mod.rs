//! Session Registry
//!
//! Sessions, their members and owner, and the per-session quota accounting
//! that every published file passes through.

pub mod limits;
pub mod registry;

pub use limits::SessionLimits;
pub use registry::{
    ApplyReport, CloseReason, FileMeta, LeaveOutcome, RejectedFile, Session, SessionInfo,
    SessionRegistry, SessionStats, SessionSummary, SnapshotReport,
};
