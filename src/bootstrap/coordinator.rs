//! Bootstrap Coordinator
//!
//! A single task that owns the whole bootstrap state and processes one event at
//! a time from its `select!` loop:
//!
//! - **Discovery**: periodic lookups, exponential backoff on failure, only one
//!   lookup in flight.
//! - **Probers**: one per discovered contact point, started and stopped as the
//!   discovered set changes.
//! - **Decisions**: seed-node observations and a periodic tick feed the join
//!   decider, at most one decision in flight.
//! - **Join**: the first decision other than `KeepProbing` is handed to the
//!   membership sink and the coordinator terminates.

use super::client::SeedNodesClient;
use super::config::ClusterBootstrapSettings;
use super::contact::{contact_point_base_uri, same_endpoint, select_hosts};
use super::decider::JoinDecider;
use super::error::BootstrapError;
use super::prober::{ContactPointProber, ProberHandle};
use super::types::{
    JoinDecision, SeedNodesInformation, SeedNodesObservation, ServiceContactsObservation,
};
use crate::discovery::types::{ContactPointCandidate, Lookup, ServiceDiscovery};
use crate::membership::service::ClusterMembership;
use crate::membership::types::Address;

use anyhow::Result;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const INBOX_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum CoordinatorMessage {
    InitiateBootstrap { self_contact_point: Url },
    ObtainedSeedNodesObservation(SeedNodesObservation),
    ProbingFailed {
        contact_point: ContactPointCandidate,
        prober_id: u64,
        cause: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    NotStarted,
    /// Initiated, no successful discovery yet.
    Discovering,
    /// Contact points known, probing and deciding.
    ActiveBootstrapping,
    Terminated,
}

/// External collaborators of the coordinator.
#[derive(Clone)]
pub struct Collaborators {
    pub discovery: Arc<dyn ServiceDiscovery>,
    pub decider: Arc<dyn JoinDecider>,
    pub membership: Arc<dyn ClusterMembership>,
    pub client: Arc<dyn SeedNodesClient>,
}

#[derive(Clone)]
pub struct CoordinatorHandle {
    inbox: mpsc::Sender<CoordinatorMessage>,
    phase: watch::Receiver<BootstrapPhase>,
    cancel: CancellationToken,
}

impl CoordinatorHandle {
    pub async fn initiate(&self, self_contact_point: Url) -> Result<(), BootstrapError> {
        self.send(CoordinatorMessage::InitiateBootstrap { self_contact_point })
            .await
    }

    pub async fn send(&self, message: CoordinatorMessage) -> Result<(), BootstrapError> {
        self.inbox
            .send(message)
            .await
            .map_err(|_| BootstrapError::CoordinatorStopped)
    }

    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.borrow()
    }

    /// Resolves once the coordinator has terminated, by joining or by shutdown.
    pub async fn terminated(&self) {
        let mut phase = self.phase.clone();
        let _ = phase
            .wait_for(|phase| *phase == BootstrapPhase::Terminated)
            .await;
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

pub struct BootstrapCoordinator {
    settings: ClusterBootstrapSettings,
    collaborators: Collaborators,
    lookup: Lookup,

    inbox: mpsc::Receiver<CoordinatorMessage>,
    /// Handed to probers so they can report back.
    inbox_sender: mpsc::Sender<CoordinatorMessage>,
    phase: watch::Sender<BootstrapPhase>,
    cancel: CancellationToken,

    self_contact_point: Option<Url>,
    last_contacts: Option<ServiceContactsObservation>,
    seed_nodes_observations: HashMap<ContactPointCandidate, SeedNodesObservation>,
    probers: HashMap<ContactPointCandidate, ProberHandle>,
    next_prober_id: u64,

    discovery_failures: u32,
    next_discovery: Option<Instant>,
    lookups: JoinSet<Result<Vec<ContactPointCandidate>>>,
    decisions: JoinSet<Result<JoinDecision>>,
}

impl BootstrapCoordinator {
    pub fn spawn(
        settings: ClusterBootstrapSettings,
        collaborators: Collaborators,
    ) -> CoordinatorHandle {
        Self::spawn_with_parent(settings, collaborators, &CancellationToken::new())
    }

    /// Like `spawn`, but the coordinator also shuts down when `parent` is cancelled.
    pub fn spawn_with_parent(
        settings: ClusterBootstrapSettings,
        collaborators: Collaborators,
        parent: &CancellationToken,
    ) -> CoordinatorHandle {
        let (inbox_sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let (phase, phase_rx) = watch::channel(BootstrapPhase::NotStarted);
        let cancel = parent.child_token();

        let coordinator = Self {
            lookup: settings.contact_point_discovery.lookup(),
            settings,
            collaborators,
            inbox,
            inbox_sender: inbox_sender.clone(),
            phase,
            cancel: cancel.clone(),
            self_contact_point: None,
            last_contacts: None,
            seed_nodes_observations: HashMap::new(),
            probers: HashMap::new(),
            next_prober_id: 0,
            discovery_failures: 0,
            next_discovery: None,
            lookups: JoinSet::new(),
            decisions: JoinSet::new(),
        };

        tokio::spawn(coordinator.run());

        CoordinatorHandle {
            inbox: inbox_sender,
            phase: phase_rx,
            cancel,
        }
    }

    async fn run(mut self) {
        let mut decide_ticker = tokio::time::interval(self.settings.contact_point.probe_interval);
        decide_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        decide_ticker.tick().await;

        loop {
            let discovery_due = self.next_discovery.is_some() && self.lookups.is_empty();
            let initiated = self.self_contact_point.is_some();

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Bootstrap coordinator shut down before joining a cluster");
                    break;
                }
                message = self.inbox.recv() => {
                    let Some(message) = message else { break };
                    self.handle_message(message);
                }
                _ = tokio::time::sleep_until(self.next_discovery.unwrap_or_else(Instant::now)), if discovery_due => {
                    self.next_discovery = None;
                    self.start_discovery();
                }
                Some(result) = self.lookups.join_next() => {
                    self.on_lookup_result(result);
                }
                _ = decide_ticker.tick(), if initiated => {
                    self.trigger_decision();
                }
                Some(result) = self.decisions.join_next() => {
                    if self.on_decision_result(result) {
                        break;
                    }
                }
            }
        }

        self.terminate();
    }

    fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::InitiateBootstrap { self_contact_point } => {
                if let Some(current) = &self.self_contact_point {
                    tracing::warn!(
                        "Bootstrap already initiated with self contact point {}, ignoring {}",
                        current,
                        self_contact_point
                    );
                    return;
                }

                tracing::info!(
                    "Locating service members using lookup [{}], self contact point {}",
                    self.lookup.service_name,
                    self_contact_point
                );
                self.self_contact_point = Some(self_contact_point);
                self.phase.send_replace(BootstrapPhase::Discovering);
                self.next_discovery = Some(Instant::now());
            }
            CoordinatorMessage::ObtainedSeedNodesObservation(observation) => {
                let known = self
                    .last_contacts
                    .as_ref()
                    .is_some_and(|contacts| contacts.contains(&observation.contact_point));
                if !known {
                    tracing::debug!(
                        "Ignoring seed nodes observation from contact point {} that is no longer discovered",
                        observation.contact_point
                    );
                    return;
                }

                let has_seed_nodes = !observation.observed_seed_nodes.is_empty();
                self.seed_nodes_observations
                    .insert(observation.contact_point.clone(), observation);

                if has_seed_nodes {
                    self.trigger_decision();
                }
            }
            CoordinatorMessage::ProbingFailed {
                contact_point,
                prober_id,
                cause,
            } => {
                let current = self.probers.get(&contact_point).map(ProberHandle::id);
                if current != Some(prober_id) {
                    tracing::debug!(
                        "Ignoring failure of replaced prober {} for contact point {}",
                        prober_id,
                        contact_point
                    );
                    return;
                }

                tracing::warn!(
                    "Probing contact point {} failed, rediscovering: {}",
                    contact_point,
                    cause
                );
                self.seed_nodes_observations.remove(&contact_point);
                self.probers.remove(&contact_point);
                self.next_discovery = Some(Instant::now());
            }
        }
    }

    fn start_discovery(&mut self) {
        let discovery = self.collaborators.discovery.clone();
        let lookup = self.lookup.clone();
        let timeout = self.settings.contact_point_discovery.resolve_timeout;

        tracing::debug!("Looking up [{}]", lookup.service_name);

        self.lookups.spawn(async move {
            match tokio::time::timeout(timeout, discovery.lookup(&lookup, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "Lookup of [{}] timed out after {:?}",
                    lookup.service_name,
                    timeout
                )),
            }
        });
    }

    fn on_lookup_result(&mut self, result: Result<Result<Vec<ContactPointCandidate>>, JoinError>) {
        let discovery = &self.settings.contact_point_discovery;
        let result = result.unwrap_or_else(|e| Err(anyhow::anyhow!("Lookup task failed: {}", e)));

        match result {
            Ok(targets) => {
                self.discovery_failures = 0;
                self.next_discovery = Some(Instant::now() + discovery.interval);
                self.on_contact_points(targets);
            }
            Err(e) => {
                let delay = backoff(
                    discovery.interval,
                    discovery.exponential_backoff_max,
                    discovery.exponential_backoff_random_factor,
                    self.discovery_failures,
                );
                self.discovery_failures = self.discovery_failures.saturating_add(1);
                self.next_discovery = Some(Instant::now() + delay);

                tracing::warn!(
                    "Resolve attempt {} for [{}] failed, retrying in {:?}: {:#}",
                    self.discovery_failures,
                    self.lookup.service_name,
                    delay,
                    e
                );
            }
        }
    }

    fn on_contact_points(&mut self, targets: Vec<ContactPointCandidate>) {
        let settings = &self.settings.contact_point;
        let selected = select_hosts(
            &self.lookup,
            settings.fallback_port,
            settings.filter_on_fallback_port,
            &targets,
        );
        let observation = ServiceContactsObservation::new(Instant::now(), selected);

        let observation = match self.last_contacts.take() {
            Some(previous) => previous.same_or_changed(observation),
            None => {
                tracing::info!(
                    "Located {} contact point(s) for [{}]",
                    observation.observed_contact_points.len(),
                    self.lookup.service_name
                );
                observation
            }
        };

        self.seed_nodes_observations
            .retain(|contact_point, _| observation.contains(contact_point));
        self.probers
            .retain(|contact_point, _| observation.contains(contact_point));

        tracing::debug!(
            "Discovered contact points: [{}]",
            sorted(&observation)
                .iter()
                .map(|contact_point| contact_point.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.last_contacts = Some(observation);
        if *self.phase.borrow() == BootstrapPhase::Discovering {
            self.phase.send_replace(BootstrapPhase::ActiveBootstrapping);
        }

        self.ensure_probing();
    }

    fn ensure_probing(&mut self) {
        let (Some(self_uri), Some(contacts)) = (&self.self_contact_point, &self.last_contacts)
        else {
            return;
        };

        let settings = &self.settings.contact_point;
        let base_path = self.settings.management_base_path.as_deref();
        let self_address = self.collaborators.membership.self_address();

        for contact_point in sorted(contacts) {
            if self
                .probers
                .get(&contact_point)
                .is_some_and(|prober| !prober.is_finished())
            {
                continue;
            }

            let base_uri = match contact_point_base_uri(
                self_uri.scheme(),
                &contact_point,
                settings.fallback_port,
                base_path,
            ) {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::warn!("Not probing {}: {:#}", contact_point, e);
                    continue;
                }
            };

            if same_endpoint(&base_uri, &self_address) {
                tracing::warn!(
                    "Contact point {} resolves to this node's remoting address {}. Discovery is most likely \
                     returning remoting ports instead of management ports, not probing it.",
                    base_uri,
                    self_address
                );
                continue;
            }

            self.next_prober_id += 1;
            let prober = ContactPointProber::spawn(
                self.next_prober_id,
                contact_point.clone(),
                base_uri,
                settings.clone(),
                self.collaborators.client.clone(),
                self.inbox_sender.clone(),
                &self.cancel,
            );
            self.probers.insert(contact_point, prober);
        }
    }

    fn trigger_decision(&mut self) {
        if !self.decisions.is_empty() {
            tracing::debug!("Join decision already in progress, skipping");
            return;
        }
        let Some(contacts) = &self.last_contacts else {
            return;
        };

        let now = Instant::now();
        let max_age = self.settings.contact_point.probing_failure_timeout;

        let mut observations: Vec<SeedNodesObservation> = self
            .seed_nodes_observations
            .values()
            .filter(|observation| now.saturating_duration_since(observation.observed_at) <= max_age)
            .cloned()
            .collect();
        observations.sort_by(|a, b| a.contact_point.cmp(&b.contact_point));

        let info = SeedNodesInformation {
            current_time: now,
            contact_points_changed_at: contacts.observed_at,
            contact_points: contacts.observed_contact_points.clone(),
            seed_nodes_observations: observations,
        };

        let decider = self.collaborators.decider.clone();
        self.decisions
            .spawn(async move { decider.decide(&info).await });
    }

    /// Applies a decision. Returns true once this node joined.
    fn on_decision_result(&mut self, result: Result<Result<JoinDecision>, JoinError>) -> bool {
        let decision = match result {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::error!("Join decider failed, keep probing: {:#}", e);
                JoinDecision::KeepProbing
            }
            Err(e) => {
                tracing::error!("Join decider task failed, keep probing: {}", e);
                JoinDecision::KeepProbing
            }
        };

        let membership = &self.collaborators.membership;
        match decision {
            JoinDecision::KeepProbing => false,
            JoinDecision::JoinOtherSeedNodes(seed_nodes) => {
                let self_address = membership.self_address();
                let seed_nodes: Vec<Address> = seed_nodes
                    .into_iter()
                    .filter(|address| *address != self_address)
                    .collect();

                if seed_nodes.is_empty() {
                    tracing::debug!("No seed nodes left after removing self, keep probing");
                    return false;
                }

                tracing::info!(
                    "Joining [{}] to existing cluster [{}]",
                    self_address,
                    seed_nodes
                        .iter()
                        .map(|address| address.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                membership.join_seed_nodes(seed_nodes);
                true
            }
            JoinDecision::JoinSelf => {
                tracing::info!("Forming new cluster, self-joining [{}]", membership.self_address());
                membership.join_self();
                true
            }
        }
    }

    fn terminate(&mut self) {
        self.probers.clear();
        self.lookups.abort_all();
        self.decisions.abort_all();
        self.cancel.cancel();
        self.phase.send_replace(BootstrapPhase::Terminated);
        tracing::debug!("Bootstrap coordinator terminated");
    }
}

fn sorted(observation: &ServiceContactsObservation) -> Vec<ContactPointCandidate> {
    let mut contact_points: Vec<ContactPointCandidate> =
        observation.observed_contact_points.iter().cloned().collect();
    contact_points.sort();
    contact_points
}

/// Delay before the next lookup after `failures` consecutive failures.
pub fn backoff(base: Duration, max: Duration, random_factor: f64, failures: u32) -> Duration {
    backoff_with(base, max, random_factor, failures, rand::random::<f64>())
}

/// `min(max, base * 2^failures) * (1 + random_factor * random)`.
pub fn backoff_with(
    base: Duration,
    max: Duration,
    random_factor: f64,
    failures: u32,
    random: f64,
) -> Duration {
    let exponential = base.as_secs_f64() * 2f64.powi(failures.min(62) as i32);
    let capped = exponential.min(max.as_secs_f64());
    Duration::try_from_secs_f64(capped * (1.0 + random_factor * random)).unwrap_or(max)
}
