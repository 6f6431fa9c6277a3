//! Domain event definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_types::{UnitState, UpgradeState};

/// General utility events (warnings, errors, operations)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneralEvent {
    DebugLog { message: String },
    Warning { message: String },
    Error { message: String },
    OperationStarted { operation: String },
    OperationCompleted { operation: String, success: bool },
}

impl GeneralEvent {
    pub fn debug(message: impl Into<String>) -> Self {
        Self::DebugLog {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Artifact download events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadEvent {
    Started {
        url: String,
        total_size: Option<u64>,
    },
    Retrying {
        url: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    Completed {
        url: String,
        final_size: u64,
        hash: String,
    },
    Failed {
        url: String,
        attempts: u32,
        error: String,
    },
}

/// Upgrade lifecycle events emitted by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpgradeEvent {
    Requested {
        action_id: Uuid,
        from_version: String,
        to_version: String,
    },
    Rejected {
        reason: String,
    },
    StateChanged {
        action_id: Uuid,
        from: UpgradeState,
        to: UpgradeState,
    },
    Verified {
        action_id: Uuid,
        key_id: String,
        hash: String,
    },
    Activated {
        action_id: Uuid,
        version: String,
        previous: String,
    },
    Failed {
        action_id: Uuid,
        state: UpgradeState,
        error: String,
    },
    Recovered {
        action_id: Uuid,
        resumed_state: UpgradeState,
    },
}

/// Watchdog events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchEvent {
    Started {
        action_id: Uuid,
        grace_remaining_secs: u64,
    },
    HealthObserved {
        agent: UnitState,
        failed_units: Vec<String>,
    },
    AgentUnobservable {
        consecutive_misses: u32,
    },
    Committed {
        action_id: Uuid,
        pruned_version: Option<String>,
    },
    RolledBack {
        action_id: Uuid,
        to_version: String,
        reason: String,
    },
    RollbackFailed {
        action_id: Uuid,
        error: String,
    },
}

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Artifact download events
    Download(DownloadEvent),

    /// Upgrade orchestration events
    Upgrade(UpgradeEvent),

    /// Watchdog events
    Watch(WatchEvent),
}

impl AppEvent {
    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Download(DownloadEvent::Failed { .. })
            | Self::Upgrade(UpgradeEvent::Failed { .. })
            | Self::Watch(WatchEvent::RollbackFailed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Download(DownloadEvent::Retrying { .. })
            | Self::Upgrade(UpgradeEvent::Rejected { .. })
            | Self::Watch(WatchEvent::AgentUnobservable { .. } | WatchEvent::RolledBack { .. }) => {
                Level::WARN
            }

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Watch(WatchEvent::HealthObserved { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "warden::events::general",
            Self::Download(_) => "warden::events::download",
            Self::Upgrade(_) => "warden::events::upgrade",
            Self::Watch(_) => "warden::events::watch",
        }
    }
}
