//! wardend - self-upgrading fleet supervisor agent
//!
//! Thin CLI over the ops crate: the agent run loop, the upgrade request
//! surface, the internal watchdog entrypoint, and status output.

mod agent;
mod cli;
mod events;

use crate::cli::{Cli, Commands};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::error;
use warden_config::{Config, DataLayout};
use warden_errors::{Error, UserFacingError};
use warden_ops::{upgrade, UpgradeRequest};
use warden_state::{MarkerStore, StatusFile};
use warden_types::{UpgradeDetails, Version};

/// Default data directory for a host-managed install
const DEFAULT_DATA_DIR: &str = "/var/lib/warden";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.json, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("{e}");
        eprintln!("Error: {}", e.user_message());
        if let Some(hint) = e.user_hint() {
            eprintln!("  hint: {hint}");
        }
        if let Some(code) = e.user_code() {
            eprintln!("  code: {code}");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let mut config = match &cli.global.config {
        Some(path) => Config::load(path).await?,
        None => Config::load_or_default(&PathBuf::from("/etc/warden/warden.toml")).await?,
    };
    config.merge_env()?;

    let data_dir = cli
        .global
        .data_dir
        .clone()
        .or_else(|| config.paths.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let layout = DataLayout::new(data_dir);

    match cli.command {
        Commands::Run => agent::run(config, layout).await,
        Commands::Watch => agent::watch(config, layout).await,
        Commands::Upgrade {
            version,
            commit,
            source,
            skip_verify,
        } => run_upgrade(config, layout, &version, commit, source, skip_verify, cli.global.json).await,
        Commands::Status => show_status(&layout, cli.global.json).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_upgrade(
    config: Config,
    layout: DataLayout,
    version: &str,
    commit: Option<String>,
    source: Option<String>,
    skip_verify: bool,
    json: bool,
) -> Result<(), Error> {
    let version = Version::parse(version.trim_start_matches('v'))?;

    let (tx, rx) = warden_events::channel();
    let logger = events::spawn_event_logger(rx);
    let ctx = agent::build_ctx(config, layout, tx).await?;

    let report = upgrade(
        &ctx,
        UpgradeRequest {
            version,
            commit,
            source_uri: source,
            skip_verify,
        },
    )
    .await;
    logger.abort();

    let report = report?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "action_id": report.action_id,
                "from": report.from.to_string(),
                "to": report.to.to_string(),
                "retry_count": report.retry_count,
                "state": report.state,
            })
        );
    } else {
        println!(
            "Upgrade {} staged: {} -> {} (pending confirmation)",
            report.action_id, report.from, report.to
        );
    }
    Ok(())
}

async fn show_status(layout: &DataLayout, json: bool) -> Result<(), Error> {
    let details: Option<UpgradeDetails> = match MarkerStore::new(layout).load().await? {
        Some(marker) => Some(UpgradeDetails {
            state: marker.state,
            action_id: marker.action_id,
            from_version: Some(marker.previous_key()),
            to_version: Some(marker.desired_key()),
            attempts: marker.retry_count,
            error: marker.error,
        }),
        None => None,
    };
    let snapshot = StatusFile::new(layout).read().await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "upgrade": details, "agent": snapshot })
        );
        return Ok(());
    }

    match snapshot {
        Some(snapshot) => {
            println!("agent: {} ({} units)", snapshot.agent, snapshot.units.len());
            for unit in &snapshot.units {
                println!("  {}: {}", unit.name, unit.state);
            }
        }
        None => println!("agent: not running (no heartbeat)"),
    }

    match details {
        Some(details) => {
            println!(
                "upgrade: {} {} -> {} [{}]",
                details.action_id,
                details.from_version.unwrap_or_default(),
                details.to_version.unwrap_or_default(),
                details.state
            );
            if let Some(error) = details.error {
                println!("  error: {error}");
            }
        }
        None => println!("upgrade: none in progress"),
    }
    Ok(())
}

fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let default_filter = if debug_enabled_flag {
        "info,warden=debug,wardend=debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        // JSON output mode: keep stdout clean, log to stderr as JSON
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}
