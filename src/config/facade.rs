//! Config loading facade: the single entry point for building a `MirrorcastConfig`.

use super::merge::merge_policy;
use super::sources::{env, global_file, workspace_file};
use super::MirrorcastConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

/// Loads configuration from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{MIRRORCAST_ENV}.toml`,
    /// `MIRRORCAST_*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<MirrorcastConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = env::add_to_builder(builder);

        let config: MirrorcastConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load configuration from one explicit file, on top of the defaults
    /// and under the environment overrides.
    pub fn load_from_file(path: &Path) -> Result<MirrorcastConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let builder = merge_policy::builder_with_defaults()?.add_source(File::from(path));
        let builder = env::add_to_builder(builder);

        let config: MirrorcastConfig = builder.build()?.try_deserialize()?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }
}
