use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use super::types::{Address, Member, MemberStatus};

/// The membership layer the bootstrap process hands over to.
///
/// Bootstrap calls exactly one of the join operations, at most once. Both are
/// fire-and-forget: the membership protocol itself (gossip, convergence,
/// failure detection) lives behind this trait.
pub trait ClusterMembership: Send + Sync {
    /// Remoting address of this node.
    fn self_address(&self) -> Address;

    /// Join an existing cluster through the given seed nodes.
    fn join_seed_nodes(&self, seed_nodes: Vec<Address>);

    /// Form a new cluster consisting of this node only.
    fn join_self(&self);

    /// Members currently considered up, used to answer seed-node probes.
    fn up_members(&self) -> Vec<Member>;
}

/// What bootstrap told the membership layer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    SelfJoined,
    JoinedSeedNodes(Vec<Address>),
}

/// In-process membership view.
///
/// Records the bootstrap outcome and keeps a table of known members so the
/// seed-nodes route can answer probes from other nodes. It assumes a join
/// succeeds immediately; convergence is the job of a real membership protocol.
pub struct LocalMembership {
    pub local_member: Member,
    members: Arc<DashMap<Address, Member>>,
    outcome: OnceLock<JoinOutcome>,
}

impl LocalMembership {
    pub fn new(self_address: Address, roles: BTreeSet<String>) -> Arc<Self> {
        let local_member = Member {
            address: self_address,
            status: MemberStatus::Joining,
            roles,
        };

        let members = Arc::new(DashMap::new());
        members.insert(local_member.address.clone(), local_member.clone());

        Arc::new(Self {
            local_member,
            members,
            outcome: OnceLock::new(),
        })
    }

    pub fn join_outcome(&self) -> Option<JoinOutcome> {
        self.outcome.get().cloned()
    }

    pub fn get_member(&self, address: &Address) -> Option<Member> {
        self.members.get(address).map(|entry| entry.value().clone())
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn record_outcome(&self, outcome: JoinOutcome) -> bool {
        match self.outcome.set(outcome) {
            Ok(()) => true,
            Err(rejected) => {
                tracing::warn!(
                    "Ignoring {:?}, this node already joined ({:?})",
                    rejected,
                    self.outcome.get()
                );
                false
            }
        }
    }

    fn mark_up(&self, address: &Address) {
        if let Some(mut member) = self.members.get_mut(address) {
            member.status = MemberStatus::Up;
        }
    }
}

impl ClusterMembership for LocalMembership {
    fn self_address(&self) -> Address {
        self.local_member.address.clone()
    }

    fn join_seed_nodes(&self, seed_nodes: Vec<Address>) {
        if !self.record_outcome(JoinOutcome::JoinedSeedNodes(seed_nodes.clone())) {
            return;
        }

        tracing::info!(
            "Node {} joining cluster via {} seed node(s)",
            self.local_member.address,
            seed_nodes.len()
        );

        for seed_node in seed_nodes {
            self.members
                .entry(seed_node.clone())
                .or_insert_with(|| Member {
                    address: seed_node,
                    status: MemberStatus::Up,
                    roles: BTreeSet::new(),
                });
        }

        self.mark_up(&self.local_member.address);
        tracing::info!("Cluster size now: {}", self.members.len());
    }

    fn join_self(&self) {
        if !self.record_outcome(JoinOutcome::SelfJoined) {
            return;
        }

        tracing::info!(
            "Node {} forming a new cluster (self-join)",
            self.local_member.address
        );
        self.mark_up(&self.local_member.address);
    }

    fn up_members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|entry| entry.value().status.is_up())
            .map(|entry| entry.value().clone())
            .collect();
        members.sort_by(|a, b| a.address.cmp(&b.address));
        members
    }
}
