//! Arena of supervised worker processes

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;
use warden_errors::{Error, PlatformError};
use warden_types::{AgentSnapshot, UnitState, UnitStatus};

/// How to launch one supervised unit
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Logical unit name, unique within the registry
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

struct RunningProcess {
    spec: ProcessSpec,
    child: Child,
}

/// Registry of running child processes keyed by logical name.
///
/// Start, stop, and restart are the only mutating operations; everything
/// else observes.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    processes: Arc<RwLock<HashMap<String, RunningProcess>>>,
}

impl ProcessRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a unit and register it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already registered or the spawn
    /// fails.
    pub async fn start(&self, spec: ProcessSpec) -> Result<u32, Error> {
        let mut processes = self.processes.write().await;
        if processes.contains_key(&spec.name) {
            return Err(PlatformError::ProcessExists {
                name: spec.name.clone(),
            }
            .into());
        }

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlatformError::SpawnFailed {
                name: spec.name.clone(),
                message: e.to_string(),
            })?;

        let pid = child.id().unwrap_or_default();
        tracing::info!(unit = %spec.name, pid, "started unit");
        processes.insert(spec.name.clone(), RunningProcess { spec, child });
        Ok(pid)
    }

    /// Stop a unit and remove it from the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is not registered or cannot be killed.
    pub async fn stop(&self, name: &str) -> Result<(), Error> {
        let mut processes = self.processes.write().await;
        let mut running = processes
            .remove(name)
            .ok_or_else(|| PlatformError::ProcessNotFound {
                name: name.to_string(),
            })?;

        running
            .child
            .kill()
            .await
            .map_err(|e| PlatformError::StopFailed {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(unit = %name, "stopped unit");
        Ok(())
    }

    /// Restart a unit in place, keeping its spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is not registered or the respawn fails.
    pub async fn restart(&self, name: &str) -> Result<u32, Error> {
        let spec = {
            let processes = self.processes.read().await;
            processes
                .get(name)
                .map(|r| r.spec.clone())
                .ok_or_else(|| PlatformError::ProcessNotFound {
                    name: name.to_string(),
                })?
        };
        self.stop(name).await?;
        self.start(spec).await
    }

    /// Stop every unit; used while the agent process set is being restarted
    /// against a different version.
    ///
    /// # Errors
    ///
    /// Returns the first stop failure encountered.
    pub async fn stop_all(&self) -> Result<(), Error> {
        let names: Vec<String> = {
            let processes = self.processes.read().await;
            processes.keys().cloned().collect()
        };
        for name in names {
            self.stop(&name).await?;
        }
        Ok(())
    }

    /// Registered unit names.
    pub async fn names(&self) -> Vec<String> {
        let processes = self.processes.read().await;
        let mut names: Vec<String> = processes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Observe every unit's state for the heartbeat snapshot.
    ///
    /// A unit whose process has exited reports `Failed` until something
    /// restarts or removes it.
    pub async fn snapshot(&self) -> AgentSnapshot {
        let mut processes = self.processes.write().await;
        let mut units: Vec<UnitStatus> = Vec::with_capacity(processes.len());

        for (name, running) in processes.iter_mut() {
            let (state, message) = match running.child.try_wait() {
                Ok(None) => (UnitState::Healthy, None),
                Ok(Some(status)) => (UnitState::Failed, Some(format!("exited: {status}"))),
                Err(e) => (UnitState::Failed, Some(format!("unobservable: {e}"))),
            };
            units.push(UnitStatus {
                name: name.clone(),
                state,
                message,
            });
        }
        units.sort_by(|a, b| a.name.cmp(&b.name));

        let agent = if units.iter().any(|u| u.state.is_failed()) {
            UnitState::Degraded
        } else {
            UnitState::Healthy
        };

        AgentSnapshot {
            agent,
            units,
            taken_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleep_spec(name: &str) -> ProcessSpec {
        ProcessSpec {
            name: name.to_string(),
            program: PathBuf::from("sleep"),
            args: vec!["30".to_string()],
        }
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let registry = ProcessRegistry::new();
        let pid = registry.start(sleep_spec("worker")).await.unwrap();
        assert!(pid > 0);
        assert_eq!(registry.names().await, vec!["worker".to_string()]);

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.agent, UnitState::Healthy);

        registry.stop("worker").await.unwrap();
        assert!(registry.names().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let registry = ProcessRegistry::new();
        registry.start(sleep_spec("worker")).await.unwrap();
        let err = registry.start(sleep_spec("worker")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::ProcessExists { .. })
        ));
        registry.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn exited_unit_reports_failed() {
        let registry = ProcessRegistry::new();
        registry
            .start(ProcessSpec {
                name: "oneshot".to_string(),
                program: PathBuf::from("true"),
                args: vec![],
            })
            .await
            .unwrap();

        // Give the process a moment to exit
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.agent, UnitState::Degraded);
        assert_eq!(snapshot.failed_units(), vec!["oneshot"]);
        registry.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn stop_unknown_unit_errors() {
        let registry = ProcessRegistry::new();
        assert!(matches!(
            registry.stop("ghost").await.unwrap_err(),
            Error::Platform(PlatformError::ProcessNotFound { .. })
        ));
    }
}
