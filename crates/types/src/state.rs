//! Upgrade state machine type definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of an upgrade, as driven by the orchestrator and, past activation,
/// recorded in the on-disk marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeState {
    Requested,
    Downloading,
    Verifying,
    Staging,
    Activating,
    Restarting,
    Watching,
    Committed,
    RolledBack,
    /// Absorbing state for unrecoverable errors before activation;
    /// nothing on disk changed.
    Failed,
}

impl UpgradeState {
    /// Whether this state ends the upgrade.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Failed)
    }

    /// Whether the version pointer may already have been switched.
    ///
    /// From `Activating` onward a crash must be recovered from the marker;
    /// before it, failures abort with no disk mutation.
    #[must_use]
    pub fn past_point_of_no_return(self) -> bool {
        matches!(
            self,
            Self::Activating | Self::Restarting | Self::Watching | Self::Committed | Self::RolledBack
        )
    }

    /// Legal successor states.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Downloading)
                | (Self::Downloading, Self::Verifying)
                | (Self::Verifying, Self::Staging)
                | (Self::Staging, Self::Activating)
                | (Self::Activating, Self::Restarting)
                | (Self::Restarting, Self::Watching)
                | (Self::Watching, Self::Committed | Self::RolledBack)
                | (
                    Self::Requested | Self::Downloading | Self::Verifying | Self::Staging,
                    Self::Failed
                )
        )
    }
}

impl std::fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Staging => "staging",
            Self::Activating => "activating",
            Self::Restarting => "restarting",
            Self::Watching => "watching",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Which process currently owns the marker for writing.
///
/// The marker is single-writer: the watcher owns it during `Watching`, the
/// orchestrator otherwise. Enforced by this tag rather than a lock manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerOwner {
    Orchestrator,
    Watcher,
}

impl std::fmt::Display for MarkerOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Orchestrator => write!(f, "orchestrator"),
            Self::Watcher => write!(f, "watcher"),
        }
    }
}

/// Externally observable projection of an upgrade.
///
/// Read-only to callers; reconstructed from the on-disk marker so it stays
/// accurate across the process restarts inherent to an upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeDetails {
    pub state: UpgradeState,
    pub action_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_version: Option<String>,
    /// Download attempts consumed so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        use UpgradeState::{
            Activating, Committed, Downloading, Requested, Restarting, Staging, Verifying, Watching,
        };
        let path = [
            Requested,
            Downloading,
            Verifying,
            Staging,
            Activating,
            Restarting,
            Watching,
            Committed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn failed_only_reachable_before_activation() {
        assert!(UpgradeState::Downloading.can_transition_to(UpgradeState::Failed));
        assert!(UpgradeState::Staging.can_transition_to(UpgradeState::Failed));
        assert!(!UpgradeState::Activating.can_transition_to(UpgradeState::Failed));
        assert!(!UpgradeState::Watching.can_transition_to(UpgradeState::Failed));
    }

    #[test]
    fn watching_resolves_to_terminal() {
        assert!(UpgradeState::Watching.can_transition_to(UpgradeState::Committed));
        assert!(UpgradeState::Watching.can_transition_to(UpgradeState::RolledBack));
        assert!(UpgradeState::Committed.is_terminal());
        assert!(UpgradeState::RolledBack.is_terminal());
        assert!(UpgradeState::Failed.is_terminal());
    }
}
