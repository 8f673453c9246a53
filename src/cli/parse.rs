//! CLI parse: clap types for Mirrorcast. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mirrorcast CLI - live, session-scoped directory mirroring
#[derive(Parser)]
#[command(name = "mirrorcast")]
#[command(about = "Mirror a local directory live to remote viewers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where config/ is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sync server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Share a directory as the owner of a session
    Share {
        /// Directory to share
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Name of the new session (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
        /// Join and claim an existing session instead of creating one
        #[arg(long)]
        session: Option<String>,
        /// Server URL (overrides client.server_url)
        #[arg(long)]
        server: Option<String>,
    },
    /// Follow a session as a viewer
    View {
        /// Session to join
        session_id: String,
        /// Write the mirrored tree into this directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print this file whenever it changes
        #[arg(long)]
        follow: Option<String>,
        /// Server URL (overrides client.server_url)
        #[arg(long)]
        server: Option<String>,
    },
    /// Inspect sessions on a server
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Show which paths the ignore rules of a directory exclude
    CheckIgnore {
        /// Directory whose .gitignore applies
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Paths relative to the directory; a trailing / marks a directory
        #[arg(required = true)]
        paths: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List live sessions
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Server URL (overrides client.server_url)
        #[arg(long)]
        server: Option<String>,
    },
    /// Show usage and limits of one session
    Stats {
        /// Session ID
        id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Server URL (overrides client.server_url)
        #[arg(long)]
        server: Option<String>,
    },
}
