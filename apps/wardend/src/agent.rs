//! Agent run loop and watcher entrypoint

use crate::events::spawn_event_logger;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use warden_config::{Config, DataLayout};
use warden_errors::{Error, WatchError};
use warden_ops::{resume_pending, OpsContextBuilder, OpsCtx};
use warden_platform::{HostServiceControl, ProcessRegistry};
use warden_state::{MarkerStore, StatusFile, WatcherHandleFile};
use warden_store::VersionStore;
use warden_types::VersionIdentity;
use warden_watch::{HeartbeatProbe, WatchOutcome, Watcher, WatcherConfig};

/// Heartbeat cadence of the running agent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Identity of the running build.
///
/// Prefers the manifest of the active installed version; a bare binary
/// outside a managed install falls back to its compile-time identity.
pub async fn running_identity(store: &VersionStore) -> VersionIdentity {
    if let Ok(Some(current)) = store.current().await {
        if let Ok(installed) = store.installed_version(&current).await {
            if let Ok(identity) = installed.manifest.identity() {
                return identity;
            }
        }
    }
    VersionIdentity::new(
        warden_types::Version::parse(env!("CARGO_PKG_VERSION"))
            .unwrap_or_else(|_| warden_types::Version::new(0, 0, 0)),
        option_env!("WARDEN_BUILD_COMMIT").map(ToString::to_string),
    )
}

/// Build the operations context used by the run loop and the upgrade
/// command.
pub async fn build_ctx(
    config: Config,
    layout: DataLayout,
    tx: warden_events::EventSender,
) -> Result<OpsCtx, Error> {
    let store = VersionStore::new(layout.clone());
    let running = running_identity(&store).await;

    OpsContextBuilder::new()
        .with_config(config)
        .with_layout(layout)
        .with_event_sender(tx)
        .with_service(Arc::new(HostServiceControl))
        .with_running(running)
        .build()
}

/// Run the agent: recover any interrupted upgrade, then supervise units
/// and publish the heartbeat until shutdown.
pub async fn run(config: Config, layout: DataLayout) -> Result<(), Error> {
    let (tx, rx) = warden_events::channel();
    let logger = spawn_event_logger(rx);

    let ctx = build_ctx(config, layout.clone(), tx).await?;
    info!(version = %ctx.running, data_dir = %layout.base().display(), "agent starting");

    // Recovery runs before normal supervision duties: a marker left by a
    // crash or a pending upgrade must be resolved first.
    match resume_pending(&ctx).await {
        Ok(Some(action)) => info!(?action, "resumed pending upgrade state"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "upgrade recovery failed"),
    }

    let registry = ProcessRegistry::new();
    let status = StatusFile::new(&layout);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let snapshot = registry.snapshot().await;
                if let Err(e) = status.write(&snapshot).await {
                    warn!(error = %e, "failed to write heartbeat");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    registry.stop_all().await?;
    logger.abort();
    Ok(())
}

/// Watchdog entrypoint (`wardend watch`).
pub async fn watch(config: Config, layout: DataLayout) -> Result<(), Error> {
    let (tx, rx) = warden_events::channel();
    let logger = spawn_event_logger(rx);

    // A heartbeat older than a few poll intervals means the agent is not
    // observable.
    let max_age = Duration::from_secs(config.upgrade.error_check_interval_secs.saturating_mul(3));
    let probe = HeartbeatProbe::new(StatusFile::new(&layout), max_age);

    let watcher = Watcher::new(
        probe,
        VersionStore::new(layout.clone()),
        MarkerStore::new(&layout),
        WatcherHandleFile::new(&layout),
        Arc::new(HostServiceControl),
        tx,
        WatcherConfig {
            failure_debounce_checks: config.upgrade.failure_debounce_checks,
            missing_debounce_checks: config.upgrade.missing_debounce_checks,
        },
        std::process::id(),
    );

    let result = watcher.run().await;
    logger.abort();

    match result {
        Ok(WatchOutcome::Committed { pruned }) => {
            info!(?pruned, "upgrade committed");
            Ok(())
        }
        Ok(WatchOutcome::RolledBack { to, reason }) => {
            warn!(%to, %reason, "upgrade rolled back");
            Ok(())
        }
        // Another watcher already finished, or there was never an upgrade:
        // exiting quietly keeps respawns harmless.
        Err(Error::Watch(WatchError::NothingToWatch)) => {
            info!("no pending upgrade to watch");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
