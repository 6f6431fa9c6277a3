//! Watch loop and commit/rollback decisions

use crate::probe::StatusProbe;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use warden_errors::{Error, WatchError};
use warden_events::{AppEvent, EventEmitter, EventSender, WatchEvent};
use warden_platform::ServiceControl;
use warden_state::{MarkerStore, UpgradeMarker, WatcherHandleFile};
use warden_store::VersionStore;
use warden_types::{MarkerOwner, UpgradeState};

/// Debounce thresholds; policy, not mechanism, so both are configurable.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Consecutive failed health reports before rolling back
    pub failure_debounce_checks: u32,
    /// Consecutive unobservable polls before rolling back
    pub missing_debounce_checks: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            failure_debounce_checks: 2,
            missing_debounce_checks: 3,
        }
    }
}

/// Terminal decision of one watch run
#[derive(Debug)]
pub enum WatchOutcome {
    /// New version held through the grace period; previous version pruned
    Committed { pruned: Option<String> },
    /// New version judged unhealthy; pointer reverted
    RolledBack { to: String, reason: String },
}

/// Judges whether a newly-activated version is trustworthy.
pub struct Watcher<P> {
    probe: P,
    store: VersionStore,
    markers: MarkerStore,
    handle: WatcherHandleFile,
    service: Arc<dyn ServiceControl>,
    tx: EventSender,
    config: WatcherConfig,
    pid: u32,
}

impl<P: StatusProbe> Watcher<P> {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        probe: P,
        store: VersionStore,
        markers: MarkerStore,
        handle: WatcherHandleFile,
        service: Arc<dyn ServiceControl>,
        tx: EventSender,
        config: WatcherConfig,
        pid: u32,
    ) -> Self {
        Self {
            probe,
            store,
            markers,
            handle,
            service,
            tx,
            config,
            pid,
        }
    }

    /// Run to a terminal decision.
    ///
    /// The grace-period deadline comes from the persisted marker, so a
    /// watcher respawned after a crash resumes the original clock instead
    /// of restarting it.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::NothingToWatch` when no marker is pending
    /// confirmation, or `WatchError::RollbackFailed` when the rollback
    /// itself fails (the one condition needing manual intervention).
    pub async fn run(self) -> Result<WatchOutcome, Error> {
        let Some(mut marker) = self.markers.load().await? else {
            return Err(WatchError::NothingToWatch.into());
        };

        match marker.state {
            UpgradeState::Restarting => {
                marker.transition(UpgradeState::Watching)?;
            }
            // Resumed after a watcher crash; keep the recorded deadline
            UpgradeState::Watching => {}
            _ => return Err(WatchError::NothingToWatch.into()),
        }
        marker.owner = MarkerOwner::Watcher;
        self.markers.update(&marker).await?;
        self.handle.acquire(self.pid).await?;

        let remaining = (marker.grace_period_end - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.tx.emit(AppEvent::Watch(WatchEvent::Started {
            action_id: marker.action_id,
            grace_remaining_secs: remaining.as_secs(),
        }));

        let interval = Duration::from_secs(marker.error_check_interval_secs);
        let mut failed_streak = 0u32;
        let mut missing_streak = 0u32;
        let mut failure_reason: Option<String> = None;

        let verdict = loop {
            if Utc::now() >= marker.grace_period_end {
                // Sustained health through the whole grace period
                break None;
            }

            match self.probe.observe().await {
                Ok(Some(snapshot)) => {
                    missing_streak = 0;
                    if snapshot.all_healthy() {
                        failed_streak = 0;
                        failure_reason = None;
                    } else {
                        failed_streak += 1;
                        let failed = snapshot.failed_units();
                        failure_reason = Some(if failed.is_empty() {
                            format!("agent state {}", snapshot.agent)
                        } else {
                            format!("failed units: {}", failed.join(", "))
                        });
                        self.tx.emit(AppEvent::Watch(WatchEvent::HealthObserved {
                            agent: snapshot.agent,
                            failed_units: failed.iter().map(ToString::to_string).collect(),
                        }));
                        if failed_streak >= self.config.failure_debounce_checks {
                            break failure_reason;
                        }
                    }
                }
                Ok(None) | Err(_) => {
                    missing_streak += 1;
                    self.tx.emit(AppEvent::Watch(WatchEvent::AgentUnobservable {
                        consecutive_misses: missing_streak,
                    }));
                    if missing_streak >= self.config.missing_debounce_checks {
                        break Some(format!(
                            "agent unobservable for {missing_streak} consecutive checks"
                        ));
                    }
                }
            }

            self.handle.refresh(self.pid).await?;

            let remaining = (marker.grace_period_end - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::time::sleep(interval.min(remaining)).await;
        };

        match verdict {
            None => self.commit(&marker).await,
            Some(reason) => self.rollback(marker, reason).await,
        }
    }

    /// Commit: prune the previous version, clear the marker.
    async fn commit(self, marker: &UpgradeMarker) -> Result<WatchOutcome, Error> {
        let previous = marker.previous_key();

        let pruned = match self.store.prune(&previous).await {
            Ok(()) => Some(previous),
            Err(e) => {
                // A failed prune costs disk, not correctness; the commit
                // still stands.
                self.tx
                    .emit_warning(format!("failed to prune {previous}: {e}"));
                None
            }
        };

        self.markers.remove().await?;
        self.handle.release().await?;

        self.tx.emit(AppEvent::Watch(WatchEvent::Committed {
            action_id: marker.action_id,
            pruned_version: pruned.clone(),
        }));
        Ok(WatchOutcome::Committed { pruned })
    }

    /// Rollback: revert the pointer, leave a terminal record, restart.
    async fn rollback(self, mut marker: UpgradeMarker, reason: String) -> Result<WatchOutcome, Error> {
        let target = marker.previous_key();

        if let Err(e) = self.store.rollback(&target).await {
            // The worst case: report loudly and stop; no second automatic
            // recovery layer on top of a possibly-corrupted install.
            marker.error = Some(format!("rollback to {target} failed: {e}"));
            self.markers.update(&marker).await?;
            self.handle.release().await?;
            self.tx.emit(AppEvent::Watch(WatchEvent::RollbackFailed {
                action_id: marker.action_id,
                error: e.to_string(),
            }));
            return Err(WatchError::RollbackFailed {
                message: format!("rollback to {target}: {e}"),
            }
            .into());
        }

        // Terminal record; the restarted agent surfaces and clears it
        marker.transition(UpgradeState::RolledBack)?;
        marker.error = Some(reason.clone());
        self.markers.update(&marker).await?;

        self.tx.emit(AppEvent::Watch(WatchEvent::RolledBack {
            action_id: marker.action_id,
            to_version: target.clone(),
            reason: reason.clone(),
        }));

        if let Err(e) = self.service.restart_agent().await {
            self.tx
                .emit_error(format!("restart after rollback failed: {e}"));
        }

        self.handle.release().await?;
        Ok(WatchOutcome::RolledBack { to: target, reason })
    }
}
