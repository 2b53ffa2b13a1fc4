//! Membership Module
//!
//! The cluster membership layer as seen by the bootstrap process.
//!
//! ## Core Concepts
//! - **Addresses**: Every node is identified by its remoting `Address`
//!   (`protocol://system@host:port`), which is what seed-node probes report.
//! - **Join Sink**: `ClusterMembership` is the hand-over point. Bootstrap calls either
//!   `join_seed_nodes` or `join_self` exactly once and then steps aside.
//! - **Local View**: `LocalMembership` records the outcome and tracks known members so
//!   that this node can in turn answer seed-node probes from nodes that start later.

pub mod service;
pub mod types;

pub use service::{ClusterMembership, JoinOutcome, LocalMembership};
pub use types::{Address, Member, MemberStatus};
