#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! The warden watchdog
//!
//! A short-lived process spawned by the newly-activated agent when it finds
//! an upgrade marker pending confirmation. It judges the new version's
//! health independently of the agent's own self-assessment and either
//! commits the upgrade or rolls it back. It always terminates; if it
//! crashes instead, the next agent startup derives a fresh watcher from the
//! persisted marker.

mod probe;
mod watcher;

pub use probe::{HeartbeatProbe, StatusProbe};
pub use watcher::{WatchOutcome, Watcher, WatcherConfig};
