//! Configuration System
//!
//! Layered configuration for the server and the share/view clients. Sources
//! are merged in order: built-in defaults, the global config file, workspace
//! files under `config/`, then `MIRRORCAST_*` environment variables.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::session::SessionLimits;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

const MIB: usize = 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorcastConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Session quotas (server side)
    #[serde(default)]
    pub limits: SessionLimits,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Frames buffered per subscriber before it is disconnected
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_body_limit() -> usize {
    5 * MIB
}

fn default_subscriber_buffer() -> usize {
    crate::broadcast::DEFAULT_SUBSCRIBER_BUFFER
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            body_limit_bytes: default_body_limit(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ApiError> {
        self.bind
            .parse()
            .map_err(|e| ApiError::ConfigError(format!("Invalid bind address '{}': {}", self.bind, e)))
    }
}

/// Settings for the `share` and `view` clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the mirrorcast server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Quiet period after the last filesystem event before a batch is flushed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Extra time past the debounce period a batch may stay open while
    /// events keep arriving
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,

    /// Distinct paths that force a flush
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// File name suffixes treated as editor scratch files
    #[serde(default = "default_transient_suffixes")]
    pub transient_suffixes: Vec<String>,

    /// Ignore patterns applied before the shared directory's `.gitignore`
    #[serde(default)]
    pub extra_ignore: Vec<String>,
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_batch_window_ms() -> u64 {
    50
}

fn default_max_batch_size() -> usize {
    100
}

fn default_transient_suffixes() -> Vec<String> {
    crate::diff::DEFAULT_TRANSIENT_SUFFIXES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            debounce_ms: default_debounce_ms(),
            batch_window_ms: default_batch_window_ms(),
            max_batch_size: default_max_batch_size(),
            transient_suffixes: default_transient_suffixes(),
            extra_ignore: Vec::new(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Server(String),
    Limits(String),
    Client(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Server(msg) => write!(f, "Server: {}", msg),
            ValidationError::Limits(msg) => write!(f, "Limits: {}", msg),
            ValidationError::Client(msg) => write!(f, "Client: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(e) = self.socket_addr() {
            errors.push(e.to_string());
        }
        if self.body_limit_bytes == 0 {
            errors.push("body_limit_bytes must be greater than 0".to_string());
        }
        if self.subscriber_buffer == 0 {
            errors.push("subscriber_buffer must be at least 1".to_string());
        }
        errors
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            errors.push(format!(
                "server_url must start with http:// or https:// (got '{}')",
                self.server_url
            ));
        }
        if self.max_batch_size == 0 {
            errors.push("max_batch_size must be at least 1".to_string());
        }
        if self.transient_suffixes.iter().any(|s| s.is_empty()) {
            errors.push("transient_suffixes must not contain empty entries".to_string());
        }
        errors
    }
}

impl MirrorcastConfig {
    /// Validate the entire configuration, reporting every bad field.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate().into_iter().map(ValidationError::Server));
        errors.extend(self.limits.validate().into_iter().map(ValidationError::Limits));
        errors.extend(self.client.validate().into_iter().map(ValidationError::Client));
        errors.extend(self.logging.validate().into_iter().map(ValidationError::Logging));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all failures into one `ConfigError`.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
