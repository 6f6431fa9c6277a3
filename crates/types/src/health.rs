//! Health snapshot types shared between the agent and the watchdog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reported state of the agent or one of its supervised units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Starting,
    Healthy,
    Degraded,
    Failed,
    Stopped,
}

impl UnitState {
    /// Whether this state counts against the upgrade grace period.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Degraded | Self::Failed)
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Status of a single supervised unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStatus {
    pub name: String,
    pub state: UnitState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Point-in-time picture of the agent and its units.
///
/// Written periodically by the running agent as a heartbeat; the watchdog
/// reads it to judge post-upgrade health without trusting the agent's own
/// summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent: UnitState,
    pub units: Vec<UnitStatus>,
    pub taken_at: DateTime<Utc>,
}

impl AgentSnapshot {
    /// Whether the agent and every unit report a non-failed state.
    #[must_use]
    pub fn all_healthy(&self) -> bool {
        !self.agent.is_failed() && self.units.iter().all(|u| !u.state.is_failed())
    }

    /// Names of units currently reporting failure, for error messages.
    #[must_use]
    pub fn failed_units(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| u.state.is_failed())
            .map(|u| u.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_health_rollup() {
        let snapshot = AgentSnapshot {
            agent: UnitState::Healthy,
            units: vec![
                UnitStatus {
                    name: "shipper".to_string(),
                    state: UnitState::Healthy,
                    message: None,
                },
                UnitStatus {
                    name: "collector".to_string(),
                    state: UnitState::Failed,
                    message: Some("exited 1".to_string()),
                },
            ],
            taken_at: Utc::now(),
        };
        assert!(!snapshot.all_healthy());
        assert_eq!(snapshot.failed_units(), vec!["collector"]);
    }

    #[test]
    fn degraded_counts_as_failed() {
        assert!(UnitState::Degraded.is_failed());
        assert!(UnitState::Failed.is_failed());
        assert!(!UnitState::Starting.is_failed());
        assert!(!UnitState::Stopped.is_failed());
    }
}
