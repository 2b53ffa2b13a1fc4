use crate::discovery::types::ContactPointCandidate;
use crate::membership::types::Address;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Result of one successful discovery round.
///
/// Observations are immutable; each discovery tick produces a new one and the
/// coordinator swaps it in wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceContactsObservation {
    pub observed_at: Instant,
    pub observed_contact_points: HashSet<ContactPointCandidate>,
}

impl ServiceContactsObservation {
    pub fn new(
        observed_at: Instant,
        contact_points: impl IntoIterator<Item = ContactPointCandidate>,
    ) -> Self {
        Self {
            observed_at,
            observed_contact_points: contact_points.into_iter().collect(),
        }
    }

    pub fn contains(&self, contact_point: &ContactPointCandidate) -> bool {
        self.observed_contact_points.contains(contact_point)
    }

    pub fn membership_equals(&self, other: &ServiceContactsObservation) -> bool {
        self.observed_contact_points == other.observed_contact_points
    }

    /// Keeps `self` (and with it the first timestamp) when `newer` observed the
    /// same set of contact points, otherwise returns `newer`.
    pub fn same_or_changed(self, newer: ServiceContactsObservation) -> ServiceContactsObservation {
        if self.membership_equals(&newer) {
            self
        } else {
            newer
        }
    }
}

/// What a single contact point reported when probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedNodesObservation {
    pub observed_at: Instant,
    pub contact_point: ContactPointCandidate,
    /// Remoting address the probed node reported for itself.
    pub source_address: Address,
    /// Cluster members the probed node offered as seed nodes. Empty when that
    /// node is not part of a cluster yet.
    pub observed_seed_nodes: BTreeSet<Address>,
}

/// Snapshot handed to the join decider.
///
/// Contains one observation per contact point at most, all of them younger than
/// the probing failure timeout at `current_time`.
#[derive(Debug, Clone)]
pub struct SeedNodesInformation {
    pub current_time: Instant,
    pub contact_points_changed_at: Instant,
    pub contact_points: HashSet<ContactPointCandidate>,
    pub seed_nodes_observations: Vec<SeedNodesObservation>,
}

impl SeedNodesInformation {
    pub fn has_seed_nodes(&self) -> bool {
        self.seed_nodes_observations
            .iter()
            .any(|observation| !observation.observed_seed_nodes.is_empty())
    }

    /// Union of every observed seed node, in address order.
    pub fn all_seed_nodes(&self) -> BTreeSet<Address> {
        self.seed_nodes_observations
            .iter()
            .flat_map(|observation| observation.observed_seed_nodes.iter().cloned())
            .collect()
    }

    /// A contact point is confirmed once it answered a probe.
    pub fn is_confirmed(&self, contact_point: &ContactPointCandidate) -> bool {
        self.seed_nodes_observations
            .iter()
            .any(|observation| &observation.contact_point == contact_point)
    }

    pub fn confirmed_contact_points(&self) -> usize {
        self.seed_nodes_observations.len()
    }

    pub fn time_since_contact_points_changed(&self) -> Duration {
        self.current_time
            .saturating_duration_since(self.contact_points_changed_at)
    }
}

/// Outcome of a join decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDecision {
    /// Not enough information yet; decide again later.
    KeepProbing,
    /// Form a new cluster with this node as its first member.
    JoinSelf,
    /// Join the existing cluster through these seed nodes.
    JoinOtherSeedNodes(BTreeSet<Address>),
}
