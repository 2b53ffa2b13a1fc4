//! Service Discovery Module
//!
//! Resolves a service name into the set of endpoints that may host peers of this node.
//!
//! Discovery backends are external collaborators: bootstrap only depends on the
//! `ServiceDiscovery` trait. `StaticServiceDiscovery` is provided for fixed
//! deployments and tests.

pub mod static_discovery;
pub mod types;

pub use static_discovery::StaticServiceDiscovery;
pub use types::{ContactPointCandidate, Lookup, ServiceDiscovery};
