//! The upgrade marker: durable record of an in-flight upgrade
//!
//! At most one marker exists at any time; its presence is the concurrency
//! lock for the whole upgrade subsystem. It is written before the version
//! pointer switches and removed only at a terminal state. The schema is
//! tolerant of unknown and missing fields so the old and new binary
//! spanning an upgrade can both parse it.

use crate::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;
use warden_config::DataLayout;
use warden_errors::{Error, StateError};
use warden_types::{MarkerOwner, UpgradeState, Version, VersionIdentity};

/// On-disk record of an in-flight or pending-confirmation upgrade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeMarker {
    pub action_id: Uuid,
    pub desired_version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_commit: Option<String>,
    pub previous_version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_commit: Option<String>,
    pub state: UpgradeState,
    #[serde(default = "default_owner")]
    pub owner: MarkerOwner,
    pub started_at: DateTime<Utc>,
    pub grace_period_end: DateTime<Utc>,
    #[serde(default = "default_interval")]
    pub error_check_interval_secs: u64,
    /// Download retries consumed before the artifact was fetched
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_owner() -> MarkerOwner {
    MarkerOwner::Orchestrator
}

fn default_interval() -> u64 {
    30
}

impl UpgradeMarker {
    #[must_use]
    pub fn desired_identity(&self) -> VersionIdentity {
        VersionIdentity::new(self.desired_version.clone(), self.desired_commit.clone())
    }

    #[must_use]
    pub fn previous_identity(&self) -> VersionIdentity {
        VersionIdentity::new(self.previous_version.clone(), self.previous_commit.clone())
    }

    /// Install key of the version being upgraded to
    #[must_use]
    pub fn desired_key(&self) -> String {
        self.desired_identity().to_string()
    }

    /// Install key of the rollback target
    #[must_use]
    pub fn previous_key(&self) -> String {
        self.previous_identity().to_string()
    }

    /// Advance to `next`, enforcing the state machine's legal transitions.
    ///
    /// # Errors
    ///
    /// Returns `StateError::InvalidTransition` for an illegal move.
    pub fn transition(&mut self, next: UpgradeState) -> Result<(), Error> {
        if !self.state.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        self.state = next;
        Ok(())
    }
}

/// Persists the upgrade marker with atomic write-then-rename
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    #[must_use]
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            path: layout.marker_path(),
        }
    }

    /// Whether a marker currently exists on disk
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Create the marker; fails if one already exists.
    ///
    /// The existence check doubles as the "upgrade already in progress"
    /// lock, so this must never silently overwrite.
    ///
    /// # Errors
    ///
    /// Returns `StateError::MarkerExists` if a marker is present, or an I/O
    /// error if the write fails.
    pub async fn create(&self, marker: &UpgradeMarker) -> Result<(), Error> {
        if self.exists().await {
            let existing = self.load().await?;
            return Err(StateError::MarkerExists {
                action_id: existing.map_or_else(String::new, |m| m.action_id.to_string()),
            }
            .into());
        }
        self.write(marker).await
    }

    /// Rewrite the marker in place (atomically).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn update(&self, marker: &UpgradeMarker) -> Result<(), Error> {
        self.write(marker).await
    }

    /// Load the marker if present.
    ///
    /// # Errors
    ///
    /// Returns `StateError::MarkerCorrupted` if the file exists but cannot
    /// be parsed.
    pub async fn load(&self) -> Result<Option<UpgradeMarker>, Error> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(&e, &self.path)),
        };
        let marker = serde_json::from_str(&content).map_err(|e| StateError::MarkerCorrupted {
            message: e.to_string(),
        })?;
        Ok(Some(marker))
    }

    /// Remove the marker; terminal commit/rollback only.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails for a reason other than the marker
    /// already being gone.
    pub async fn remove(&self) -> Result<(), Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }

    async fn write(&self, marker: &UpgradeMarker) -> Result<(), Error> {
        let content =
            serde_json::to_vec_pretty(marker).map_err(|e| StateError::MarkerWriteFailed {
                message: e.to_string(),
            })?;
        write_atomic(&self.path, &content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn marker(state: UpgradeState) -> UpgradeMarker {
        UpgradeMarker {
            action_id: Uuid::new_v4(),
            desired_version: Version::parse("2.0.0").unwrap(),
            desired_commit: Some("bbb222".to_string()),
            previous_version: Version::parse("1.0.0").unwrap(),
            previous_commit: Some("aaa111".to_string()),
            state,
            owner: MarkerOwner::Orchestrator,
            started_at: Utc::now(),
            grace_period_end: Utc::now() + Duration::seconds(600),
            error_check_interval_secs: 30,
            retry_count: 0,
            error: None,
        }
    }

    #[tokio::test]
    async fn create_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(&DataLayout::new(dir.path()));

        let m = marker(UpgradeState::Activating);
        store.create(&m).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.action_id, m.action_id);
        assert_eq!(loaded.state, UpgradeState::Activating);
        assert_eq!(loaded.desired_key(), "2.0.0-bbb222");
        assert_eq!(loaded.previous_key(), "1.0.0-aaa111");
    }

    #[tokio::test]
    async fn create_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(&DataLayout::new(dir.path()));

        store.create(&marker(UpgradeState::Activating)).await.unwrap();
        let err = store
            .create(&marker(UpgradeState::Activating))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::State(StateError::MarkerExists { .. })));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(&DataLayout::new(dir.path()));

        store.remove().await.unwrap();
        store.create(&marker(UpgradeState::Watching)).await.unwrap();
        store.remove().await.unwrap();
        assert!(!store.exists().await);
    }

    #[tokio::test]
    async fn unknown_fields_are_tolerated() {
        // A newer binary may add fields; this one must still parse the file
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(&DataLayout::new(dir.path()));

        let mut value = serde_json::to_value(marker(UpgradeState::Watching)).unwrap();
        value["added_in_some_future_release"] = serde_json::json!({"nested": true});
        tokio::fs::write(
            DataLayout::new(dir.path()).marker_path(),
            serde_json::to_vec(&value).unwrap(),
        )
        .await
        .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.state, UpgradeState::Watching);
    }

    #[tokio::test]
    async fn missing_optional_fields_get_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = MarkerStore::new(&layout);

        // The minimal schema an older binary might have written
        let content = serde_json::json!({
            "action_id": Uuid::new_v4(),
            "desired_version": "2.0.0",
            "previous_version": "1.0.0",
            "state": "watching",
            "started_at": Utc::now(),
            "grace_period_end": Utc::now(),
        });
        tokio::fs::write(layout.marker_path(), serde_json::to_vec(&content).unwrap())
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.owner, MarkerOwner::Orchestrator);
        assert_eq!(loaded.error_check_interval_secs, 30);
        assert_eq!(loaded.retry_count, 0);
    }

    #[test]
    fn transition_enforces_state_machine() {
        let mut m = marker(UpgradeState::Activating);
        m.transition(UpgradeState::Restarting).unwrap();
        m.transition(UpgradeState::Watching).unwrap();
        let err = m.transition(UpgradeState::Downloading).unwrap_err();
        assert!(matches!(
            err,
            Error::State(StateError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn corrupted_marker_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        tokio::fs::write(layout.marker_path(), b"{ not json")
            .await
            .unwrap();

        let err = MarkerStore::new(&layout).load().await.unwrap_err();
        assert!(matches!(
            err,
            Error::State(StateError::MarkerCorrupted { .. })
        ));
    }
}
