//! Summaries printed when share/view exit.

use crate::client::{ShareSummary, ViewSummary};

pub fn format_share_summary(summary: &ShareSummary) -> String {
    format!(
        "Stopped sharing session {}: {} batch(es), {} change(s) published",
        summary.session_id, summary.batches, summary.records
    )
}

pub fn format_view_summary(summary: &ViewSummary) -> String {
    let reason = if summary.closed {
        "session closed"
    } else {
        "stopped"
    };
    format!(
        "Viewer {}: {} update(s) received, {} file(s) mirrored",
        reason, summary.envelopes, summary.files
    )
}
