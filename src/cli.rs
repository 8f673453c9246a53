//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to the server and clients.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, SessionCommands};
pub use presentation::{
    format_ignore_results, format_session_list, format_session_stats, format_share_summary,
    format_view_summary, IgnoreCheck,
};
pub use route::RunContext;
