//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources replace earlier values key by key. Arrays are replaced
//! wholesale, never concatenated.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("server.bind", "127.0.0.1:3000")?
        .set_default("client.server_url", "http://127.0.0.1:3000")?
        .set_default("logging.level", "info")
}
