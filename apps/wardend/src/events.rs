//! Bridge from domain events to tracing output
//!
//! Everything observable goes through the event channel; this is the one
//! place events become log lines.

use tracing::{debug, error, info, warn};
use warden_events::{AppEvent, DownloadEvent, EventReceiver, GeneralEvent, UpgradeEvent, WatchEvent};

/// Drain the event channel for the lifetime of the process.
pub fn spawn_event_logger(mut rx: EventReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_event(&event);
        }
    })
}

#[allow(clippy::too_many_lines)]
fn log_event(event: &AppEvent) {
    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::DebugLog { message } => debug!("{message}"),
            GeneralEvent::Warning { message } => warn!("{message}"),
            GeneralEvent::Error { message } => error!("{message}"),
            GeneralEvent::OperationStarted { operation } => info!(%operation, "operation started"),
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(%operation, success, "operation completed");
            }
        },
        AppEvent::Download(download) => match download {
            DownloadEvent::Started { url, total_size } => {
                info!(%url, ?total_size, "download started");
            }
            DownloadEvent::Retrying {
                url,
                attempt,
                delay_ms,
                error,
            } => {
                warn!(%url, attempt, delay_ms, %error, "download retrying");
            }
            DownloadEvent::Completed {
                url, final_size, ..
            } => {
                info!(%url, final_size, "download completed");
            }
            DownloadEvent::Failed {
                url,
                attempts,
                error,
            } => {
                error!(%url, attempts, %error, "download failed");
            }
        },
        AppEvent::Upgrade(upgrade) => match upgrade {
            UpgradeEvent::Requested {
                action_id,
                from_version,
                to_version,
            } => {
                info!(%action_id, %from_version, %to_version, "upgrade requested");
            }
            UpgradeEvent::Rejected { reason } => warn!(%reason, "upgrade rejected"),
            UpgradeEvent::StateChanged {
                action_id,
                from,
                to,
            } => {
                info!(%action_id, %from, %to, "upgrade state changed");
            }
            UpgradeEvent::Verified {
                action_id,
                key_id,
                hash,
            } => {
                info!(%action_id, %key_id, %hash, "artifact verified");
            }
            UpgradeEvent::Activated {
                action_id,
                version,
                previous,
            } => {
                info!(%action_id, %version, %previous, "version activated");
            }
            UpgradeEvent::Failed {
                action_id,
                state,
                error,
            } => {
                error!(%action_id, %state, %error, "upgrade failed");
            }
            UpgradeEvent::Recovered {
                action_id,
                resumed_state,
            } => {
                info!(%action_id, %resumed_state, "upgrade recovered after restart");
            }
        },
        AppEvent::Watch(watch) => match watch {
            WatchEvent::Started {
                action_id,
                grace_remaining_secs,
            } => {
                info!(%action_id, grace_remaining_secs, "watcher started");
            }
            WatchEvent::HealthObserved {
                agent,
                failed_units,
            } => {
                debug!(%agent, ?failed_units, "health observed");
            }
            WatchEvent::AgentUnobservable { consecutive_misses } => {
                warn!(consecutive_misses, "agent unobservable");
            }
            WatchEvent::Committed {
                action_id,
                pruned_version,
            } => {
                info!(%action_id, ?pruned_version, "upgrade committed");
            }
            WatchEvent::RolledBack {
                action_id,
                to_version,
                reason,
            } => {
                warn!(%action_id, %to_version, %reason, "upgrade rolled back");
            }
            WatchEvent::RollbackFailed { action_id, error } => {
                error!(%action_id, %error, "rollback failed, manual intervention required");
            }
        },
    }
}
