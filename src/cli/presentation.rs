//! CLI presentation: text and json formatters per command family.

mod ignore;
mod run;
mod session;

pub use ignore::{format_ignore_results, IgnoreCheck};
pub use run::{format_share_summary, format_view_summary};
pub use session::{format_session_list, format_session_stats};
