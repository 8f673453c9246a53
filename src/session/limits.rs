//! Session quota limits

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Caps enforced by the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Maximum number of live sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Maximum number of files tracked per session
    #[serde(default = "default_max_files_per_session")]
    pub max_files_per_session: usize,

    /// Maximum size of a single file in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum combined size of a session's files in bytes
    #[serde(default = "default_max_session_size")]
    pub max_session_size: u64,
}

fn default_max_sessions() -> usize {
    5
}

fn default_max_files_per_session() -> usize {
    500
}

fn default_max_file_size() -> u64 {
    5 * MIB
}

fn default_max_session_size() -> u64 {
    50 * MIB
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            max_files_per_session: default_max_files_per_session(),
            max_file_size: default_max_file_size(),
            max_session_size: default_max_session_size(),
        }
    }
}

impl SessionLimits {
    /// Check that every limit is usable. Returns one message per bad field.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_sessions == 0 {
            errors.push("limits.max_sessions must be at least 1".to_string());
        }
        if self.max_files_per_session == 0 {
            errors.push("limits.max_files_per_session must be at least 1".to_string());
        }
        if self.max_file_size == 0 {
            errors.push("limits.max_file_size must be greater than 0".to_string());
        }
        if self.max_session_size < self.max_file_size {
            errors.push(format!(
                "limits.max_session_size ({}) must not be smaller than limits.max_file_size ({})",
                self.max_session_size, self.max_file_size
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = SessionLimits::default();
        assert_eq!(limits.max_sessions, 5);
        assert_eq!(limits.max_files_per_session, 500);
        assert_eq!(limits.max_file_size, 5 * MIB);
        assert_eq!(limits.max_session_size, 50 * MIB);
        assert!(limits.validate().is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let limits: SessionLimits = toml::from_str("max_sessions = 2").unwrap();
        assert_eq!(limits.max_sessions, 2);
        assert_eq!(limits.max_files_per_session, 500);
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let limits = SessionLimits {
            max_sessions: 0,
            max_files_per_session: 0,
            max_file_size: 10,
            max_session_size: 5,
        };
        assert_eq!(limits.validate().len(), 3);
    }
}
