//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// warden - self-upgrading fleet supervisor agent
#[derive(Parser)]
#[command(name = "wardend", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Data directory (default /var/lib/warden)
    #[arg(long, global = true, value_name = "DIR", env = "WARDEN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the agent and supervise its units
    Run,

    /// Upgrade the agent to a new version
    Upgrade {
        /// Target version, e.g. 2.1.0
        version: String,

        /// Expected commit hash of the target build
        #[arg(long)]
        commit: Option<String>,

        /// Artifact source override (URL or local directory)
        #[arg(long, value_name = "URI")]
        source: Option<String>,

        /// Skip artifact verification (testing only)
        #[arg(long, hide = true)]
        skip_verify: bool,
    },

    /// Watch a pending upgrade and commit or roll it back
    ///
    /// Spawned by the agent itself after an upgrade; not for interactive use.
    #[command(hide = true)]
    Watch,

    /// Show agent and upgrade status
    Status,
}
