#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Upgrade orchestration for warden
//!
//! This crate drives the upgrade state machine
//! Fetch → Verify → Stage → Activate → Restart → Watch and exposes the
//! externally observable upgrade status. The watchdog's half of the
//! protocol lives in `warden-watch`; startup recovery reconnects the two
//! after any crash.

mod context;
mod keys;
mod recovery;
mod status;
mod upgrade;

pub use context::{OpsContextBuilder, OpsCtx};
pub use keys::resolve_trusted_keys;
pub use recovery::{resume_pending, ResumeAction};
pub use status::upgrade_details;
pub use upgrade::{upgrade, UpgradeReport, UpgradeRequest};
