//! Operations context for dependency injection

use std::sync::Arc;
use tokio::sync::Mutex;
use warden_config::{Config, DataLayout};
use warden_errors::{Error, UpgradeError};
use warden_events::EventSender;
use warden_net::NetClient;
use warden_platform::ServiceControl;
use warden_state::{MarkerStore, StatusFile, WatcherHandleFile};
use warden_store::VersionStore;
use warden_types::{UpgradeDetails, UpgradeState, Uuid, VersionIdentity};

/// Operations context providing access to all system components
pub struct OpsCtx {
    /// Version store / installer
    pub store: VersionStore,
    /// Upgrade marker store
    pub markers: MarkerStore,
    /// Watcher liveness handle
    pub watcher_handle: WatcherHandleFile,
    /// Agent heartbeat file
    pub status: StatusFile,
    /// Network client
    pub net: NetClient,
    /// Event sender for progress reporting
    pub tx: EventSender,
    /// System configuration
    pub config: Config,
    /// Data directory layout
    pub layout: DataLayout,
    /// OS service-layer restart seam
    pub service: Arc<dyn ServiceControl>,
    /// Identity of the running build
    pub running: VersionIdentity,
    /// In-memory phase of an upgrade that has not reached the marker yet
    pub(crate) inflight: Arc<Mutex<Option<UpgradeDetails>>>,
}

impl OpsCtx {
    /// Claim the pre-marker in-flight slot for a new upgrade.
    ///
    /// Before the marker exists the in-memory slot is the only lock; once
    /// the marker is written it takes over.
    ///
    /// # Errors
    ///
    /// Returns `UpgradeError::AlreadyInProgress` if a non-terminal upgrade
    /// holds the slot.
    pub(crate) async fn begin_inflight(
        &self,
        action_id: Uuid,
        to: &VersionIdentity,
    ) -> Result<(), Error> {
        let mut inflight = self.inflight.lock().await;
        if let Some(details) = inflight.as_ref() {
            // Restarting means the pipeline handed off; from then on the
            // marker on disk is the lock, and the caller checked it.
            if !details.state.is_terminal() && details.state != UpgradeState::Restarting {
                return Err(UpgradeError::AlreadyInProgress {
                    action_id: details.action_id.to_string(),
                }
                .into());
            }
        }
        *inflight = Some(UpgradeDetails {
            state: UpgradeState::Requested,
            action_id,
            from_version: Some(self.running.to_string()),
            to_version: Some(to.to_string()),
            attempts: 0,
            error: None,
        });
        Ok(())
    }

    /// Record an in-memory phase change for the status surface.
    pub(crate) async fn set_phase(&self, state: UpgradeState) {
        let mut inflight = self.inflight.lock().await;
        if let Some(details) = inflight.as_mut() {
            details.state = state;
        }
    }

    /// Record the terminal failure of a pre-activation upgrade.
    pub(crate) async fn set_failed(&self, error: &Error) {
        let mut inflight = self.inflight.lock().await;
        if let Some(details) = inflight.as_mut() {
            details.state = UpgradeState::Failed;
            details.error = Some(error.to_string());
        }
    }

    pub(crate) async fn set_attempts(&self, attempts: u32) {
        let mut inflight = self.inflight.lock().await;
        if let Some(details) = inflight.as_mut() {
            details.attempts = attempts;
        }
    }

    pub(crate) async fn inflight_details(&self) -> Option<UpgradeDetails> {
        self.inflight.lock().await.clone()
    }
}

/// Builder for [`OpsCtx`]
#[derive(Default)]
pub struct OpsContextBuilder {
    config: Option<Config>,
    layout: Option<DataLayout>,
    net: Option<NetClient>,
    tx: Option<EventSender>,
    service: Option<Arc<dyn ServiceControl>>,
    running: Option<VersionIdentity>,
}

impl OpsContextBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: DataLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    #[must_use]
    pub fn with_net(mut self, net: NetClient) -> Self {
        self.net = Some(net);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: Arc<dyn ServiceControl>) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn with_running(mut self, running: VersionIdentity) -> Self {
        self.running = Some(running);
        self
    }

    /// Build the context.
    ///
    /// # Errors
    ///
    /// Returns an error if a required component is missing.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let layout = self
            .layout
            .ok_or_else(|| Error::internal("OpsCtx requires a data layout"))?;
        let tx = self
            .tx
            .ok_or_else(|| Error::internal("OpsCtx requires an event sender"))?;
        let running = self
            .running
            .ok_or_else(|| Error::internal("OpsCtx requires the running version identity"))?;

        let net = match self.net {
            Some(net) => net,
            None => NetClient::with_defaults()?,
        };

        Ok(OpsCtx {
            store: VersionStore::new(layout.clone()),
            markers: MarkerStore::new(&layout),
            watcher_handle: WatcherHandleFile::new(&layout),
            status: StatusFile::new(&layout),
            net,
            tx,
            config: self.config.unwrap_or_default(),
            layout,
            service: self
                .service
                .unwrap_or_else(|| Arc::new(warden_platform::NullServiceControl)),
            running,
            inflight: Arc::new(Mutex::new(None)),
        })
    }
}
