#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Process supervision primitives for warden
//!
//! An arena of supervised child processes keyed by logical name, with
//! start/stop/restart as the only mutating operations, plus the seam that
//! isolates OS service-layer control (restarting the agent itself) from
//! the upgrade core.

mod registry;
mod service;
mod watcher;

pub use registry::{ProcessRegistry, ProcessSpec};
pub use service::{HostServiceControl, NullServiceControl, ServiceControl};
pub use watcher::spawn_watcher;
