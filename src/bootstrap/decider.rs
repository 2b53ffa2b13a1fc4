use super::config::ClusterBootstrapSettings;
use super::contact::{matches_self, uri_host_port};
use super::protocol::MAX_SEED_NODES;
use super::service::SelfContactPoint;
use super::types::{JoinDecision, SeedNodesInformation};
use crate::membership::types::Address;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Policy turning a snapshot of probe results into a join decision.
///
/// Called repeatedly until it returns something other than `KeepProbing`.
/// Errors are logged by the coordinator and treated as `KeepProbing`.
#[async_trait]
pub trait JoinDecider: Send + Sync {
    async fn decide(&self, info: &SeedNodesInformation) -> Result<JoinDecision>;
}

/// Joins an existing cluster as soon as one is observed. Otherwise the node
/// with the lowest contact point forms a new cluster, once enough contact
/// points answered and the discovered set has been stable for a while.
pub struct LowestAddressJoinDecider {
    settings: ClusterBootstrapSettings,
    self_contact_point: SelfContactPoint,
    self_address: Address,
}

impl LowestAddressJoinDecider {
    pub fn new(
        settings: ClusterBootstrapSettings,
        self_contact_point: SelfContactPoint,
        self_address: Address,
    ) -> Self {
        Self {
            settings,
            self_contact_point,
            self_address,
        }
    }

    /// Decision for a node whose management endpoint is `self_host:self_port`.
    pub fn decide_with(
        &self,
        info: &SeedNodesInformation,
        self_host: &str,
        self_port: u16,
    ) -> JoinDecision {
        let discovery = &self.settings.contact_point_discovery;

        if info.has_seed_nodes() {
            let seed_nodes: BTreeSet<Address> = info
                .all_seed_nodes()
                .into_iter()
                .take(MAX_SEED_NODES)
                .filter(|address| *address != self.self_address)
                .collect();

            if seed_nodes.is_empty() {
                tracing::debug!("Only seed node observed is this node itself, keep probing");
                return JoinDecision::KeepProbing;
            }
            return JoinDecision::JoinOtherSeedNodes(seed_nodes);
        }

        let confirmed = info.confirmed_contact_points();
        if confirmed < discovery.required_contact_points_nr {
            tracing::info!(
                "Discovered [{}] contact points, confirmed [{}], which is less than the required [{}], retrying",
                info.contact_points.len(),
                confirmed,
                discovery.required_contact_points_nr
            );
            return JoinDecision::KeepProbing;
        }

        let stable_for = info.time_since_contact_points_changed();
        if stable_for < discovery.stable_margin {
            tracing::debug!(
                "Contact points changed {:?} ago, waiting for stable margin {:?}",
                stable_for,
                discovery.stable_margin
            );
            return JoinDecision::KeepProbing;
        }

        if discovery.contact_with_all_contact_points {
            let unconfirmed = info
                .contact_points
                .iter()
                .filter(|contact_point| !info.is_confirmed(contact_point))
                .count();
            if unconfirmed > 0 {
                tracing::info!(
                    "Waiting for {} of {} discovered contact point(s) to answer before forming a new cluster",
                    unconfirmed,
                    info.contact_points.len()
                );
                return JoinDecision::KeepProbing;
            }
        }

        let Some(lowest) = info.contact_points.iter().min() else {
            return JoinDecision::KeepProbing;
        };

        if !matches_self(lowest, self_host, self_port) {
            tracing::info!(
                "Exceeded stable margin without locating seed nodes, however this node {}:{} is NOT the lowest \
                 address out of the discovered endpoints. Expecting node [{}] to perform the self-join and \
                 initiate the cluster.",
                self_host,
                self_port,
                lowest
            );
            return JoinDecision::KeepProbing;
        }

        if !self.settings.new_cluster_enabled {
            tracing::warn!(
                "This node {}:{} is the lowest address but forming a new cluster is disabled. \
                 Waiting for an existing cluster to show up.",
                self_host,
                self_port
            );
            return JoinDecision::KeepProbing;
        }

        tracing::info!(
            "Initiating new cluster, self-joining [{}]. Other nodes are expected to locate this cluster via \
             continued contact point probing.",
            self.self_address
        );
        JoinDecision::JoinSelf
    }
}

#[async_trait]
impl JoinDecider for LowestAddressJoinDecider {
    async fn decide(&self, info: &SeedNodesInformation) -> Result<JoinDecision> {
        let uri = self
            .self_contact_point
            .get()
            .ok_or_else(|| anyhow::anyhow!("Self contact point is not known yet"))?;
        let (host, port) = uri_host_port(&uri)
            .ok_or_else(|| anyhow::anyhow!("Self contact point {} has no host or port", uri))?;

        Ok(self.decide_with(info, &host, port))
    }
}
