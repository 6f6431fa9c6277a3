//! Startup recovery
//!
//! Every agent startup re-reads the marker before doing anything else. A
//! crash can interrupt an upgrade at any point past the marker write; the
//! marker records enough to finish the job: re-activate if the pointer
//! never switched, respawn the watchdog if it died without deciding, or
//! surface and clear a terminal rollback.

use crate::context::OpsCtx;
use warden_errors::{Error, UpgradeError};
use warden_events::{AppEvent, EventEmitter, UpgradeEvent};
use warden_types::{UpgradeState, Uuid};

/// What recovery did with a marker found at startup
#[derive(Debug, Clone)]
pub enum ResumeAction {
    /// Upgrade still pending confirmation; a fresh watcher was spawned
    ResumedWatch { action_id: Uuid },
    /// A live watcher already owns the upgrade; nothing to do
    WatcherAlive { action_id: Uuid },
    /// A terminal rollback was surfaced and its marker cleared
    RollbackSurfaced {
        action_id: Uuid,
        error: Option<String>,
    },
}

/// Inspect the marker and resume whatever the previous process left
/// unfinished.
///
/// # Errors
///
/// Returns an error if the marker cannot be read, a needed re-activation
/// fails, or the watcher cannot be spawned.
pub async fn resume_pending(ctx: &OpsCtx) -> Result<Option<ResumeAction>, Error> {
    let Some(mut marker) = ctx.markers.load().await? else {
        return Ok(None);
    };
    let action_id = marker.action_id;

    match marker.state {
        UpgradeState::Activating => {
            // Crashed between the marker write and the pointer switch (or
            // mid-switch, which the atomic rename makes equivalent).
            let desired = marker.desired_key();
            if ctx.store.current().await?.as_deref() != Some(desired.as_str()) {
                ctx.store.activate(&desired).await.map_err(|e| {
                    UpgradeError::RecoveryFailed {
                        message: format!("re-activating {desired}: {e}"),
                    }
                })?;
            }
            marker.transition(UpgradeState::Restarting)?;
            ctx.markers.update(&marker).await?;
            spawn_watcher(ctx)?;
            ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Recovered {
                action_id,
                resumed_state: UpgradeState::Restarting,
            }));
            Ok(Some(ResumeAction::ResumedWatch { action_id }))
        }
        UpgradeState::Restarting | UpgradeState::Watching => {
            if ctx
                .watcher_handle
                .is_alive(ctx.config.upgrade.watcher_staleness())
                .await
            {
                return Ok(Some(ResumeAction::WatcherAlive { action_id }));
            }
            // The watcher died without deciding; derive a fresh one from
            // the marker. The persisted grace deadline keeps the clock.
            spawn_watcher(ctx)?;
            ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Recovered {
                action_id,
                resumed_state: marker.state,
            }));
            Ok(Some(ResumeAction::ResumedWatch { action_id }))
        }
        UpgradeState::RolledBack => {
            ctx.tx.emit_warning(format!(
                "upgrade {action_id} was rolled back: {}",
                marker.error.as_deref().unwrap_or("unknown reason")
            ));
            ctx.markers.remove().await?;
            Ok(Some(ResumeAction::RollbackSurfaced {
                action_id,
                error: marker.error,
            }))
        }
        other => {
            // Markers are only ever written at activation or later;
            // anything else is debris from a corrupted write.
            ctx.tx.emit_warning(format!(
                "discarding upgrade marker in unexpected state {other}"
            ));
            ctx.markers.remove().await?;
            Ok(None)
        }
    }
}

fn spawn_watcher(ctx: &OpsCtx) -> Result<u32, Error> {
    let binary = ctx.layout.current_link().join(warden_store::BINARY_PATH);
    ctx.service.spawn_watcher(&binary, ctx.layout.base())
}
