use super::client::{HttpSeedNodesClient, SeedNodesClient};
use super::config::ClusterBootstrapSettings;
use super::coordinator::{BootstrapCoordinator, BootstrapPhase, Collaborators, CoordinatorHandle};
use super::decider::{JoinDecider, LowestAddressJoinDecider};
use super::error::BootstrapError;
use crate::discovery::types::ServiceDiscovery;
use crate::membership::service::ClusterMembership;

use reqwest::Url;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

/// How long `start()` waits for the self contact point to be completed.
pub const SELF_CONTACT_POINT_GRACE: Duration = Duration::from_secs(10);

/// Management base URI of this node, set once the HTTP endpoint is bound.
///
/// Completed at most once; later completions are ignored.
#[derive(Clone)]
pub struct SelfContactPoint {
    inner: Arc<watch::Sender<Option<Url>>>,
}

impl SelfContactPoint {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            inner: Arc::new(sender),
        }
    }

    /// Returns false if the contact point was already set.
    pub fn complete(&self, uri: Url) -> bool {
        self.inner.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(uri);
            true
        })
    }

    pub fn get(&self) -> Option<Url> {
        self.inner.borrow().clone()
    }

    pub async fn wait(&self, timeout: Duration) -> Result<Url, BootstrapError> {
        let mut receiver = self.inner.subscribe();
        let uri = match tokio::time::timeout(timeout, receiver.wait_for(Option::is_some)).await {
            Ok(Ok(current)) => (*current).clone(),
            _ => None,
        };
        uri.ok_or(BootstrapError::SelfContactPointTimeout(timeout))
    }
}

impl Default for SelfContactPoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point: discovers peers, then joins an existing cluster or forms a new one.
///
/// ```ignore
/// let bootstrap = ClusterBootstrap::new(settings, discovery, membership)?;
/// bootstrap.self_contact_point().complete(management_uri);
/// bootstrap.start().await?;
/// bootstrap.wait_for_completion().await?;
/// ```
pub struct ClusterBootstrap {
    settings: ClusterBootstrapSettings,
    discovery: Arc<dyn ServiceDiscovery>,
    membership: Arc<dyn ClusterMembership>,
    decider: Arc<dyn JoinDecider>,
    client: Arc<dyn SeedNodesClient>,
    self_contact_point: SelfContactPoint,
    /// Serializes `start()` calls.
    start_lock: Mutex<()>,
    /// Parent of the coordinator's token; cancelled by `shutdown()`.
    cancel: CancellationToken,
    coordinator: OnceLock<CoordinatorHandle>,
}

impl ClusterBootstrap {
    pub fn new(
        settings: ClusterBootstrapSettings,
        discovery: Arc<dyn ServiceDiscovery>,
        membership: Arc<dyn ClusterMembership>,
    ) -> Result<Self, BootstrapError> {
        settings.validate()?;

        let self_contact_point = SelfContactPoint::new();
        let decider = Arc::new(LowestAddressJoinDecider::new(
            settings.clone(),
            self_contact_point.clone(),
            membership.self_address(),
        ));

        Ok(Self {
            settings,
            discovery,
            membership,
            decider,
            client: Arc::new(HttpSeedNodesClient::new()),
            self_contact_point,
            start_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
            coordinator: OnceLock::new(),
        })
    }

    pub fn with_join_decider(mut self, decider: Arc<dyn JoinDecider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn with_seed_nodes_client(mut self, client: Arc<dyn SeedNodesClient>) -> Self {
        self.client = client;
        self
    }

    pub fn self_contact_point(&self) -> &SelfContactPoint {
        &self.self_contact_point
    }

    /// Waits for the self contact point, then starts the coordinator.
    ///
    /// Returns once the coordinator runs or with the error that stopped it from
    /// starting. Concurrent calls run one after another; once the coordinator runs,
    /// further calls are no-ops. A failed start can be retried. After `shutdown()`
    /// every call fails with `CoordinatorStopped`.
    pub async fn start(&self) -> Result<(), BootstrapError> {
        let _guard = self.start_lock.lock().await;

        if self.cancel.is_cancelled() {
            return Err(BootstrapError::CoordinatorStopped);
        }
        if self.coordinator.get().is_some() {
            tracing::info!("Bootstrap already started, ignoring");
            return Ok(());
        }

        tracing::info!(
            "Bootstrap using service [{}], waiting for self contact point",
            self.settings.contact_point_discovery.effective_service_name()
        );

        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BootstrapError::CoordinatorStopped),
            uri = self.self_contact_point.wait(SELF_CONTACT_POINT_GRACE) => uri,
        };
        let uri = match waited {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!("Bootstrap failed: {}", e);
                return Err(e);
            }
        };

        let handle = BootstrapCoordinator::spawn_with_parent(
            self.settings.clone(),
            Collaborators {
                discovery: self.discovery.clone(),
                decider: self.decider.clone(),
                membership: self.membership.clone(),
                client: self.client.clone(),
            },
            &self.cancel,
        );
        handle.initiate(uri).await?;
        let _ = self.coordinator.set(handle);

        Ok(())
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.coordinator
            .get()
            .map_or(BootstrapPhase::NotStarted, CoordinatorHandle::phase)
    }

    /// Resolves once this node joined a cluster or bootstrap was shut down.
    pub async fn wait_for_completion(&self) -> Result<(), BootstrapError> {
        let handle = self
            .coordinator
            .get()
            .ok_or(BootstrapError::CoordinatorStopped)?;
        handle.terminated().await;
        Ok(())
    }

    /// Stops the coordinator, or a `start()` still waiting for the self contact point.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
