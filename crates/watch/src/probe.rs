//! Health observation seam

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use warden_errors::Error;
use warden_state::StatusFile;
use warden_types::AgentSnapshot;

/// Source of agent health observations.
///
/// `Ok(None)` means the agent could not be observed at all, which counts
/// toward the crash-loop debounce rather than the failure debounce.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn observe(&self) -> Result<Option<AgentSnapshot>, Error>;
}

/// Production probe: reads the agent's heartbeat snapshot file.
///
/// A heartbeat older than `max_age` is treated as unobservable; a crashed
/// or hung agent stops updating the file.
pub struct HeartbeatProbe {
    status: StatusFile,
    max_age: Duration,
}

impl HeartbeatProbe {
    #[must_use]
    pub fn new(status: StatusFile, max_age: Duration) -> Self {
        Self { status, max_age }
    }
}

#[async_trait]
impl StatusProbe for HeartbeatProbe {
    async fn observe(&self) -> Result<Option<AgentSnapshot>, Error> {
        let Some(snapshot) = self.status.read().await? else {
            return Ok(None);
        };

        let age = Utc::now().signed_duration_since(snapshot.taken_at);
        let max_age = chrono::Duration::from_std(self.max_age)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));
        if age > max_age {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }
}
