//! CLI route: single route table and run context. Dispatches to the server,
//! the clients, and presentation.

use crate::cli::parse::{Commands, SessionCommands};
use crate::cli::presentation::{
    format_ignore_results, format_session_list, format_session_stats, format_share_summary,
    format_view_summary, IgnoreCheck,
};
use crate::client::{ShareDaemon, ShareOptions, SyncClient, ViewOptions, Viewer};
use crate::config::{ConfigLoader, MirrorcastConfig};
use crate::error::ApiError;
use crate::filter::load_matcher;
use crate::server;
use crate::tree::path::{canonicalize_root, TreePath};
use crate::types::SessionId;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: MirrorcastConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.ensure_valid()?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    /// Context over an already built configuration.
    pub fn with_config(workspace_root: PathBuf, config: MirrorcastConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &MirrorcastConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve { bind } => {
                let mut config = self.config.clone();
                if let Some(bind) = bind {
                    config.server.bind = bind.clone();
                }
                config.ensure_valid()?;
                runtime()?.block_on(server::serve(&config))?;
                Ok("Server stopped.".to_string())
            }
            Commands::Share {
                dir,
                name,
                session,
                server,
            } => {
                let client = self.client(server.as_deref())?;
                let options = ShareOptions {
                    root: self.resolve(dir),
                    name: name.clone(),
                    session: session.as_deref().map(SessionId::from),
                };
                let config = self.config.client.clone();
                let max_file_size = self.config.limits.max_file_size;
                let summary = runtime()?.block_on(async move {
                    let daemon = ShareDaemon::start(client, options, config, max_file_size).await?;
                    println!(
                        "Sharing {} as session {}",
                        daemon.root().display(),
                        daemon.session_id()
                    );
                    daemon.run(ctrl_c()).await
                })?;
                Ok(format_share_summary(&summary))
            }
            Commands::View {
                session_id,
                out,
                follow,
                server,
            } => {
                let client = self.client(server.as_deref())?;
                let mut options = ViewOptions::new(SessionId::from(session_id.as_str()));
                options.out = out.as_ref().map(|p| self.resolve(p));
                options.follow = follow.as_deref().map(TreePath::parse);
                let viewer = Viewer::new(client, options)?;
                let summary = runtime()?.block_on(viewer.run(ctrl_c()))?;
                Ok(format_view_summary(&summary))
            }
            Commands::Sessions { command } => self.handle_sessions(command),
            Commands::Config => self.config.to_toml(),
            Commands::CheckIgnore { dir, paths, format } => {
                self.handle_check_ignore(dir, paths, format)
            }
        }
    }

    fn handle_sessions(&self, command: &SessionCommands) -> Result<String, ApiError> {
        match command {
            SessionCommands::List { format, server } => {
                let client = self.client(server.as_deref())?;
                let sessions = runtime()?.block_on(client.list_sessions())?;
                format_session_list(&sessions, format)
            }
            SessionCommands::Stats { id, format, server } => {
                let client = self.client(server.as_deref())?;
                let id = SessionId::from(id.as_str());
                let stats = runtime()?.block_on(async {
                    client.join_session(&id).await?;
                    let stats = client.stats().await;
                    if let Err(e) = client.leave().await {
                        debug!(error = %e, "Failed to leave after reading stats");
                    }
                    stats
                })?;
                format_session_stats(&stats, format)
            }
        }
    }

    fn handle_check_ignore(
        &self,
        dir: &Path,
        paths: &[String],
        format: &str,
    ) -> Result<String, ApiError> {
        let root = canonicalize_root(&self.resolve(dir))?;
        let matcher = load_matcher(&root, &self.config.client.extra_ignore)?;
        let results: Vec<IgnoreCheck> = paths
            .iter()
            .map(|path| IgnoreCheck {
                path: path.clone(),
                ignored: matcher.is_ignored(path),
                pattern: matcher
                    .deciding_pattern(path)
                    .map(|pattern| pattern.source().to_string()),
            })
            .collect();
        format_ignore_results(&results, format)
    }

    fn client(&self, server: Option<&str>) -> Result<SyncClient, ApiError> {
        let url = server.unwrap_or(&self.config.client.server_url);
        SyncClient::new(url)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

fn runtime() -> Result<Runtime, ApiError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn ctrl_c() -> impl Future<Output = ()> {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
