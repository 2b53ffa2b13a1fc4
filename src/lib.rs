//! Cluster Formation Bootstrap Library
//!
//! Lets nodes of a dynamic fleet (containers, autoscaled VMs, no fixed peer
//! list) find each other and form exactly one cluster between them. It serves
//! as the foundation for the demo node binary (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`bootstrap`**: The discovery/probe/decide loop. A coordinator task looks up
//!   peers, one prober task per peer asks for known seed nodes over HTTP, and a
//!   pluggable join decider picks between joining an existing cluster and
//!   forming a new one.
//! - **`discovery`**: The service discovery seam (`ServiceDiscovery`) plus a static,
//!   in-memory backend.
//! - **`membership`**: The cluster membership seam (`ClusterMembership`) that receives
//!   the join decision, remoting addresses, and an in-process membership view.

pub mod bootstrap;
pub mod discovery;
pub mod membership;
