//! Upgrade pipeline
//!
//! Drives one upgrade from request to the restart that hands control to
//! the new binary. Everything before the marker write aborts cleanly with
//! no disk mutation; the marker write immediately before activation is the
//! commit point, after which only the watchdog's rollback can undo the
//! pointer switch.

use crate::context::OpsCtx;
use crate::keys::resolve_trusted_keys;
use chrono::Utc;
use warden_errors::{Error, UpgradeError};
use warden_events::{AppEvent, EventEmitter, UpgradeEvent};
use warden_hash::Hash;
use warden_net::{ArtifactFetcher, RetryConfig};
use warden_signing::{verify_artifact, VerifiedArtifact};
use warden_state::UpgradeMarker;
use warden_types::{
    MarkerOwner, Os, PackageFormat, PackageSpec, UpgradeState, Uuid, Version, VersionIdentity,
};

/// An upgrade request as accepted from the request surface
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    pub version: Version,
    pub commit: Option<String>,
    /// Override of the configured artifact source
    pub source_uri: Option<String>,
    /// Test-only escape hatch; skips checksum and signature verification
    pub skip_verify: bool,
}

impl UpgradeRequest {
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self {
            version,
            commit: None,
            source_uri: None,
            skip_verify: false,
        }
    }
}

/// Result of a successfully handed-off upgrade
#[derive(Debug, Clone)]
pub struct UpgradeReport {
    pub action_id: Uuid,
    pub from: VersionIdentity,
    pub to: VersionIdentity,
    /// Download retries consumed before the artifact was fetched
    pub retry_count: u32,
    pub state: UpgradeState,
}

/// Run one upgrade to the restart handoff.
///
/// # Errors
///
/// Rejects immediately with `UpgradeError::SameVersion` or
/// `UpgradeError::AlreadyInProgress` without touching disk. Failures up to
/// activation return the underlying error with nothing mutated; failures
/// after the restart handoff leave the marker in place for recovery.
pub async fn upgrade(ctx: &OpsCtx, request: UpgradeRequest) -> Result<UpgradeReport, Error> {
    let desired = VersionIdentity::new(request.version.clone(), request.commit.clone());

    // Entry guard: upgrading to the running build is a caller error, not a
    // retryable condition.
    if desired.same_build(&ctx.running) {
        ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Rejected {
            reason: format!("already at requested version {desired}"),
        }));
        return Err(UpgradeError::SameVersion {
            version: desired.to_string(),
        }
        .into());
    }

    // Entry guard: a marker on disk means an upgrade is pending
    // confirmation (or awaiting recovery); either way no new state machine
    // may start.
    if let Some(existing) = ctx.markers.load().await? {
        ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Rejected {
            reason: format!("upgrade {} already in progress", existing.action_id),
        }));
        return Err(UpgradeError::AlreadyInProgress {
            action_id: existing.action_id.to_string(),
        }
        .into());
    }

    let action_id = Uuid::new_v4();
    ctx.begin_inflight(action_id, &desired).await?;

    ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Requested {
        action_id,
        from_version: ctx.running.to_string(),
        to_version: desired.to_string(),
    }));

    let result = run_pipeline(ctx, &request, &desired, action_id).await;
    if let Err(e) = &result {
        ctx.set_failed(e).await;
        ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Failed {
            action_id,
            state: UpgradeState::Failed,
            error: e.to_string(),
        }));
    }
    result
}

async fn run_pipeline(
    ctx: &OpsCtx,
    request: &UpgradeRequest,
    desired: &VersionIdentity,
    action_id: Uuid,
) -> Result<UpgradeReport, Error> {
    let spec = PackageSpec {
        identity: desired.clone(),
        os: Os::current(),
        arch: warden_types::Arch::current(),
        format: PackageFormat::default(),
        source_uri: request
            .source_uri
            .clone()
            .unwrap_or_else(|| ctx.config.upgrade.source_uri.clone()),
    };

    enter_phase(ctx, action_id, UpgradeState::Requested, UpgradeState::Downloading).await;
    let retry = RetryConfig {
        max_attempts: ctx.config.network.retries + 1,
        initial_delay: ctx.config.network.retry_delay(),
        deadline: ctx.config.network.fetch_deadline_duration(),
        ..RetryConfig::default()
    };
    let fetcher = ArtifactFetcher::new(
        ctx.net.clone(),
        retry,
        ctx.layout.staging_dir(),
        ctx.tx.clone(),
    );
    let fetched = fetcher.fetch(&spec).await?;
    let retry_count = fetched.attempts.saturating_sub(1);
    ctx.set_attempts(retry_count).await;

    enter_phase(ctx, action_id, UpgradeState::Downloading, UpgradeState::Verifying).await;
    let artifact = if request.skip_verify {
        ctx.tx
            .emit_warning("artifact verification disabled for this upgrade");
        VerifiedArtifact {
            hash: Hash::hash_file(&fetched.package_path).await?,
            package_path: fetched.package_path.clone(),
            key_id: String::new(),
        }
    } else {
        let keys = resolve_trusted_keys(
            &ctx.net,
            ctx.config.upgrade.signing_key_uri.as_deref(),
            &ctx.tx,
        )
        .await;
        verify_artifact(
            &fetched.package_path,
            &fetched.checksum_path,
            &fetched.signature_path,
            &keys,
        )
        .await?
    };
    ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Verified {
        action_id,
        key_id: artifact.key_id.clone(),
        hash: artifact.hash.to_hex(),
    }));

    enter_phase(ctx, action_id, UpgradeState::Verifying, UpgradeState::Staging).await;
    let installed = ctx.store.stage(&artifact, &spec).await?;

    enter_phase(ctx, action_id, UpgradeState::Staging, UpgradeState::Activating).await;

    // The marker must be durable before the pointer switches: a crash can
    // never leave an activated version with no record of how to undo it.
    let now = Utc::now();
    let grace = chrono::Duration::from_std(ctx.config.upgrade.grace_period())
        .unwrap_or_else(|_| chrono::Duration::seconds(600));
    let mut marker = UpgradeMarker {
        action_id,
        desired_version: desired.version.clone(),
        desired_commit: desired.commit.clone(),
        previous_version: ctx.running.version.clone(),
        previous_commit: ctx.running.commit.clone(),
        state: UpgradeState::Activating,
        owner: MarkerOwner::Orchestrator,
        started_at: now,
        grace_period_end: now + grace,
        error_check_interval_secs: ctx.config.upgrade.error_check_interval_secs,
        retry_count,
        error: None,
    };
    ctx.markers.create(&marker).await?;

    if let Err(e) = ctx.store.activate(&installed.key).await {
        // The atomic swap failed before the pointer moved; clear the
        // marker so the failure is a clean pre-commit abort.
        ctx.markers.remove().await?;
        return Err(e);
    }
    ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::Activated {
        action_id,
        version: installed.key.clone(),
        previous: ctx.running.to_string(),
    }));

    marker.transition(UpgradeState::Restarting)?;
    ctx.markers.update(&marker).await?;
    ctx.set_phase(UpgradeState::Restarting).await;
    ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::StateChanged {
        action_id,
        from: UpgradeState::Activating,
        to: UpgradeState::Restarting,
    }));

    // The verified artifact is consumed exactly once; drop the staged files
    for path in [
        &fetched.package_path,
        &fetched.checksum_path,
        &fetched.signature_path,
    ] {
        let _ = tokio::fs::remove_file(path).await;
    }

    if let Err(e) = ctx.service.restart_agent().await {
        // Pointer already switched; the marker keeps recovery possible at
        // the next startup.
        ctx.tx
            .emit_error(format!("restart after activation failed: {e}"));
        return Err(UpgradeError::RestartFailed {
            message: e.to_string(),
        }
        .into());
    }

    Ok(UpgradeReport {
        action_id,
        from: ctx.running.clone(),
        to: desired.clone(),
        retry_count,
        state: UpgradeState::Restarting,
    })
}

async fn enter_phase(ctx: &OpsCtx, action_id: Uuid, from: UpgradeState, to: UpgradeState) {
    ctx.set_phase(to).await;
    ctx.tx.emit(AppEvent::Upgrade(UpgradeEvent::StateChanged {
        action_id,
        from,
        to,
    }));
}
