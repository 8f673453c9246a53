//! Session command presentation: list and stats, text/json.

use crate::error::ApiError;
use crate::session::{SessionStats, SessionSummary};
use comfy_table::Table;

const MIB: f64 = 1024.0 * 1024.0;

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if (bytes as f64) < MIB {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB)
    }
}

pub fn format_session_list(sessions: &[SessionSummary], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return Ok(serde_json::to_string_pretty(sessions)?);
    }
    if sessions.is_empty() {
        return Ok("No active sessions.\n\nUse 'mirrorcast share <dir>' to start one.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["ID", "Name", "Files", "Size", "Created"]);
    for s in sessions {
        table.add_row(vec![
            s.id.to_string(),
            s.name.clone(),
            s.file_count.to_string(),
            human_size(s.total_size),
            s.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ]);
    }
    Ok(format!("{}\nTotal: {} session(s)", table, sessions.len()))
}

pub fn format_session_stats(stats: &SessionStats, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return Ok(serde_json::to_string_pretty(stats)?);
    }
    let mut output = format!("Session: {} ({})\n", stats.name, stats.id);
    output.push_str(&format!("Files: {} / {}\n", stats.file_count, stats.max_files));
    output.push_str(&format!(
        "Size: {} / {}\n",
        human_size(stats.total_size),
        human_size(stats.max_size)
    ));
    output.push_str(&format!("Clients: {}\n", stats.client_count));
    output.push_str(&format!(
        "Owner: {}",
        if stats.has_owner { "connected" } else { "none" }
    ));
    Ok(output)
}
