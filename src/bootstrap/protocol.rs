//! Seed-Nodes Wire Protocol
//!
//! DTOs exchanged between bootstrapping nodes over the management HTTP endpoint.
//! Field names are camelCase on the wire.

use crate::membership::types::{Address, Member, MemberStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const ENDPOINT_SEED_NODES: &str = "/bootstrap/seed-nodes";

/// Upper bound on seed nodes offered by the route and joined by the decider.
pub const MAX_SEED_NODES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedNodesResponse {
    pub self_node: Address,
    pub seed_nodes: Vec<ClusterMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMember {
    pub node: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_uid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MemberStatus>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl From<&Member> for ClusterMember {
    fn from(member: &Member) -> Self {
        Self {
            node: member.address.clone(),
            node_uid: None,
            status: Some(member.status),
            roles: member.roles.clone(),
        }
    }
}

impl SeedNodesResponse {
    pub fn seed_addresses(&self) -> BTreeSet<Address> {
        self.seed_nodes
            .iter()
            .map(|member| member.node.clone())
            .collect()
    }
}
