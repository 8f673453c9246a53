//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, ErrorCategory};

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Transport(detail) => format!(
            "Could not reach the mirrorcast server ({}). Is `mirrorcast serve` running?",
            detail
        ),
        ApiError::Remote { message, .. } if e.category() == ErrorCategory::NotFound => {
            format!("Not found: {}", message)
        }
        ApiError::Remote { message, .. } => message.clone(),
        _ => e.to_string(),
    }
}
