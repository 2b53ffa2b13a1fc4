//! Static Service Discovery
//!
//! An in-memory table of service name -> endpoints. Useful for fixed deployments,
//! local development and tests. Entries can be replaced at runtime, which is how
//! tests simulate a fleet scaling up or down.

use super::types::{ContactPointCandidate, Lookup, ServiceDiscovery};

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct StaticServiceDiscovery {
    services: DashMap<String, Vec<ContactPointCandidate>>,
}

impl StaticServiceDiscovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the endpoints registered for `service_name`.
    pub fn set_targets(&self, service_name: &str, targets: Vec<ContactPointCandidate>) {
        tracing::debug!(
            "Registering {} static target(s) for service {}",
            targets.len(),
            service_name
        );
        self.services.insert(service_name.to_string(), targets);
    }

    pub fn remove_service(&self, service_name: &str) {
        self.services.remove(service_name);
    }
}

impl Default for StaticServiceDiscovery {
    fn default() -> Self {
        Self {
            services: DashMap::new(),
        }
    }
}

#[async_trait]
impl ServiceDiscovery for StaticServiceDiscovery {
    async fn lookup(
        &self,
        lookup: &Lookup,
        _resolve_timeout: Duration,
    ) -> anyhow::Result<Vec<ContactPointCandidate>> {
        match self.services.get(&lookup.service_name) {
            Some(targets) => Ok(targets.value().clone()),
            None => Err(anyhow::anyhow!(
                "No static targets registered for service [{}]",
                lookup.service_name
            )),
        }
    }
}
