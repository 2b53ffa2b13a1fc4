//! Cluster Formation Bootstrap
//!
//! Lets a node in a dynamic fleet find its peers and either join their cluster
//! or, when none exists yet, agree with them on which single node forms it.
//!
//! ## Flow
//! 1. `ClusterBootstrap::start` waits for this node's management endpoint
//!    (the self contact point) and spawns the coordinator.
//! 2. The coordinator looks up the service and spawns one prober per contact point.
//! 3. Probers ask their contact point for seed nodes over HTTP.
//! 4. The join decider turns the collected answers into a decision, which the
//!    coordinator hands to the membership layer exactly once.

pub mod client;
pub mod config;
pub mod contact;
pub mod coordinator;
pub mod decider;
pub mod error;
pub mod handlers;
pub mod prober;
pub mod protocol;
pub mod service;
pub mod types;

pub use client::{HttpSeedNodesClient, SeedNodesClient};
pub use config::ClusterBootstrapSettings;
pub use coordinator::BootstrapPhase;
pub use decider::{JoinDecider, LowestAddressJoinDecider};
pub use error::BootstrapError;
pub use service::{ClusterBootstrap, SelfContactPoint};
pub use types::JoinDecision;
