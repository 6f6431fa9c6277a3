//! Externally observable upgrade status
//!
//! The only contract the upgrade core offers to the outside: a read-only
//! projection of the in-flight upgrade. It is rebuilt from the on-disk
//! marker whenever one exists, so it stays accurate across the process
//! restarts an upgrade necessarily goes through; the in-memory phase only
//! covers the window before the marker is written.

use crate::context::OpsCtx;
use warden_errors::Error;
use warden_types::UpgradeDetails;

/// Current upgrade details, if an upgrade is (or recently was) in flight.
///
/// # Errors
///
/// Returns an error if a marker exists but cannot be read.
pub async fn upgrade_details(ctx: &OpsCtx) -> Result<Option<UpgradeDetails>, Error> {
    if let Some(marker) = ctx.markers.load().await? {
        return Ok(Some(UpgradeDetails {
            state: marker.state,
            action_id: marker.action_id,
            from_version: Some(marker.previous_key()),
            to_version: Some(marker.desired_key()),
            attempts: marker.retry_count,
            error: marker.error,
        }));
    }
    Ok(ctx.inflight_details().await)
}
