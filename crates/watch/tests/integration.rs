//! Watchdog decision tests against a real on-disk version store

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use semver::Version;
use std::sync::Arc;
use uuid::Uuid;
use warden_config::DataLayout;
use warden_errors::Error;
use warden_platform::NullServiceControl;
use warden_state::{MarkerStore, UpgradeMarker, WatcherHandleFile};
use warden_store::{write_manifest, VersionStore};
use warden_types::{
    AgentSnapshot, Manifest, MarkerOwner, UnitState, UnitStatus, UpgradeState, VersionIdentity,
};
use warden_watch::{StatusProbe, WatchOutcome, Watcher, WatcherConfig};

/// Probe that always reports the same observation
enum FixedProbe {
    Healthy,
    FailingUnit,
    Unobservable,
}

#[async_trait]
impl StatusProbe for FixedProbe {
    async fn observe(&self) -> Result<Option<AgentSnapshot>, Error> {
        match self {
            Self::Healthy => Ok(Some(AgentSnapshot {
                agent: UnitState::Healthy,
                units: vec![],
                taken_at: Utc::now(),
            })),
            Self::FailingUnit => Ok(Some(AgentSnapshot {
                agent: UnitState::Healthy,
                units: vec![UnitStatus {
                    name: "collector".to_string(),
                    state: UnitState::Failed,
                    message: Some("exited 1".to_string()),
                }],
                taken_at: Utc::now(),
            })),
            Self::Unobservable => Ok(None),
        }
    }
}

/// Fabricate an installed version directory without going through staging
async fn install_version(layout: &DataLayout, version: &str, commit: &str) -> String {
    let identity = VersionIdentity::new(Version::parse(version).unwrap(), Some(commit.to_string()));
    let key = identity.to_string();
    let dir = layout.version_dir(&key);
    tokio::fs::create_dir_all(dir.join("bin")).await.unwrap();
    tokio::fs::write(dir.join("bin/wardend"), &key).await.unwrap();
    write_manifest(
        &dir.join("manifest.toml"),
        &Manifest::new(&identity, false, "00".repeat(32)),
    )
    .await
    .unwrap();
    key
}

struct Fixture {
    _dir: tempfile::TempDir,
    layout: DataLayout,
    store: VersionStore,
    markers: MarkerStore,
    v1: String,
    v2: String,
}

/// v1 installed, v2 installed and active, marker in `state`
async fn upgraded_fixture(state: UpgradeState, grace_secs: i64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let store = VersionStore::new(layout.clone());

    let v1 = install_version(&layout, "1.0.0", "aaa111").await;
    let v2 = install_version(&layout, "2.0.0", "bbb222").await;
    store.activate(&v2).await.unwrap();

    let markers = MarkerStore::new(&layout);
    markers
        .create(&UpgradeMarker {
            action_id: Uuid::new_v4(),
            desired_version: Version::parse("2.0.0").unwrap(),
            desired_commit: Some("bbb222".to_string()),
            previous_version: Version::parse("1.0.0").unwrap(),
            previous_commit: Some("aaa111".to_string()),
            state,
            owner: MarkerOwner::Orchestrator,
            started_at: Utc::now(),
            grace_period_end: Utc::now() + ChronoDuration::seconds(grace_secs),
            error_check_interval_secs: 1,
            retry_count: 0,
            error: None,
        })
        .await
        .unwrap();

    Fixture {
        _dir: dir,
        layout,
        store,
        markers,
        v1,
        v2,
    }
}

fn watcher(fixture: &Fixture, probe: FixedProbe, config: WatcherConfig) -> Watcher<FixedProbe> {
    let (tx, _rx) = warden_events::channel();
    Watcher::new(
        probe,
        fixture.store.clone(),
        fixture.markers.clone(),
        WatcherHandleFile::new(&fixture.layout),
        Arc::new(NullServiceControl),
        tx,
        config,
        std::process::id(),
    )
}

#[tokio::test]
async fn sustained_unit_failure_rolls_back_to_previous() {
    let fixture = upgraded_fixture(UpgradeState::Restarting, 30).await;

    let outcome = watcher(
        &fixture,
        FixedProbe::FailingUnit,
        WatcherConfig {
            failure_debounce_checks: 1,
            missing_debounce_checks: 3,
        },
    )
    .run()
    .await
    .unwrap();

    match outcome {
        WatchOutcome::RolledBack { to, reason } => {
            assert_eq!(to, fixture.v1);
            assert!(reason.contains("collector"));
        }
        other => panic!("expected rollback, got {other:?}"),
    }

    // Pointer reverted to the pre-upgrade version
    assert_eq!(
        fixture.store.current().await.unwrap().as_deref(),
        Some(fixture.v1.as_str())
    );
    // Terminal record left for the restarted agent to surface
    let marker = fixture.markers.load().await.unwrap().unwrap();
    assert_eq!(marker.state, UpgradeState::RolledBack);
    assert!(marker.error.is_some());
    // No zombie watcher handle
    assert!(WatcherHandleFile::new(&fixture.layout)
        .read()
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn healthy_grace_period_commits_and_prunes() {
    let fixture = upgraded_fixture(UpgradeState::Restarting, 1).await;

    let outcome = watcher(&fixture, FixedProbe::Healthy, WatcherConfig::default())
        .run()
        .await
        .unwrap();

    match outcome {
        WatchOutcome::Committed { pruned } => {
            assert_eq!(pruned.as_deref(), Some(fixture.v1.as_str()));
        }
        other => panic!("expected commit, got {other:?}"),
    }

    assert_eq!(
        fixture.store.current().await.unwrap().as_deref(),
        Some(fixture.v2.as_str())
    );
    assert!(!fixture.store.is_installed(&fixture.v1).await);
    assert!(!fixture.markers.exists().await);
}

#[tokio::test]
async fn respawned_watcher_resumes_persisted_deadline() {
    // Marker already in Watching (the previous watcher died) with the
    // deadline already reached: a fresh watcher must commit immediately
    // instead of restarting the clock.
    let fixture = upgraded_fixture(UpgradeState::Watching, -1).await;

    let outcome = watcher(&fixture, FixedProbe::Unobservable, WatcherConfig::default())
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, WatchOutcome::Committed { .. }));
    assert!(!fixture.markers.exists().await);
}

#[tokio::test]
async fn unobservable_agent_rolls_back_after_debounce() {
    let fixture = upgraded_fixture(UpgradeState::Restarting, 30).await;

    let outcome = watcher(
        &fixture,
        FixedProbe::Unobservable,
        WatcherConfig {
            failure_debounce_checks: 2,
            missing_debounce_checks: 2,
        },
    )
    .run()
    .await
    .unwrap();

    match outcome {
        WatchOutcome::RolledBack { to, reason } => {
            assert_eq!(to, fixture.v1);
            assert!(reason.contains("unobservable"));
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(
        fixture.store.current().await.unwrap().as_deref(),
        Some(fixture.v1.as_str())
    );
}

#[tokio::test]
async fn no_marker_means_nothing_to_watch() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let (tx, _rx) = warden_events::channel();

    let watcher = Watcher::new(
        FixedProbe::Healthy,
        VersionStore::new(layout.clone()),
        MarkerStore::new(&layout),
        WatcherHandleFile::new(&layout),
        Arc::new(NullServiceControl),
        tx,
        WatcherConfig::default(),
        std::process::id(),
    );

    assert!(watcher.run().await.is_err());
}
