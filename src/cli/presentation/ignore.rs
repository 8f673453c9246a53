//! check-ignore presentation.

use crate::error::ApiError;
use serde::Serialize;

/// Verdict for one queried path.
#[derive(Debug, Clone, Serialize)]
pub struct IgnoreCheck {
    pub path: String,
    pub ignored: bool,
    /// Pattern that decided the verdict, if any matched
    pub pattern: Option<String>,
}

pub fn format_ignore_results(results: &[IgnoreCheck], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return Ok(serde_json::to_string_pretty(results)?);
    }
    let lines: Vec<String> = results
        .iter()
        .map(|r| {
            let verdict = if r.ignored { "ignored" } else { "included" };
            match &r.pattern {
                Some(pattern) => format!("{:<8} {}  ({})", verdict, r.path, pattern),
                None => format!("{:<8} {}", verdict, r.path),
            }
        })
        .collect();
    Ok(lines.join("\n"))
}
