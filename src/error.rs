//! Error types for the Mirrorcast synchronization system.

use crate::types::SessionId;
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

/// Whole mebibytes read as `5MB`; anything else is given in bytes.
fn human_limit(bytes: &u64) -> String {
    let bytes = *bytes;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Quota violations. Every variant names the limit that was hit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("Maximum number of sessions ({max}) reached")]
    TooManySessions { max: usize },

    #[error("Maximum files per session ({max}) reached")]
    TooManyFiles { max: usize },

    #[error("File {path} ({size} bytes) exceeds maximum size of {}", human_limit(.max))]
    FileTooLarge { path: String, size: u64, max: u64 },

    #[error("Session would exceed maximum size of {}", human_limit(.max))]
    SessionTooLarge { max: u64 },
}

/// Coarse classification of an error, used to pick the HTTP status and
/// decide how much detail a caller gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Permission,
    Conflict,
    Quota,
    Internal,
}

/// Errors surfaced by the registry, hub, service, server, and clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Session {0} already has an owner")]
    OwnershipConflict(SessionId),

    #[error(transparent)]
    QuotaExceeded(#[from] QuotaError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server responded {status}: {message}")]
    Remote { status: u16, message: String },
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Validation(_) => ErrorCategory::Validation,
            ApiError::SessionNotFound(_) => ErrorCategory::NotFound,
            ApiError::PermissionDenied(_) => ErrorCategory::Permission,
            ApiError::OwnershipConflict(_) => ErrorCategory::Conflict,
            ApiError::QuotaExceeded(_) => ErrorCategory::Quota,
            ApiError::Remote { status, .. } => match status {
                400 | 413 | 422 => ErrorCategory::Validation,
                403 => ErrorCategory::Permission,
                404 => ErrorCategory::NotFound,
                409 => ErrorCategory::Conflict,
                _ => ErrorCategory::Internal,
            },
            ApiError::Internal(_)
            | ApiError::ConfigError(_)
            | ApiError::Io(_)
            | ApiError::Serialization(_)
            | ApiError::Transport(_) => ErrorCategory::Internal,
        }
    }

    /// Message safe to return to a remote caller. Internal failures collapse
    /// to a generic message; the detail belongs in operator logs only.
    pub fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::Internal => "Server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<notify::Error> for ApiError {
    fn from(err: notify::Error) -> Self {
        ApiError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("File watcher failed: {}", err),
        ))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}
