//! Bootstrap Settings
//!
//! Every knob of the discovery/probe/decide loop with production defaults.
//! Settings are plain data; build them with struct update syntax and call
//! [`ClusterBootstrapSettings::validate`] before starting bootstrap.

use super::error::BootstrapError;
use crate::discovery::types::Lookup;
use std::time::Duration;

/// Port the management HTTP endpoint listens on when discovery does not report one.
pub const DEFAULT_MANAGEMENT_PORT: u16 = 8558;

#[derive(Debug, Clone)]
pub struct ContactPointDiscoverySettings {
    pub service_name: String,
    pub service_namespace: Option<String>,
    /// Named port to request from discovery. Disables fallback-port filtering.
    pub port_name: Option<String>,
    pub protocol: Option<String>,

    /// Delay between successful discovery rounds, and the base of the failure backoff.
    pub interval: Duration,
    pub exponential_backoff_max: Duration,
    pub exponential_backoff_random_factor: f64,
    pub resolve_timeout: Duration,

    /// Minimum number of contact points that must have answered before this
    /// node may form a new cluster.
    pub required_contact_points_nr: usize,
    pub contact_with_all_contact_points: bool,
    /// How long the discovered set must stay unchanged before forming a new cluster.
    pub stable_margin: Duration,
}

impl ContactPointDiscoverySettings {
    /// `name`, or `name.namespace` when a namespace is configured.
    pub fn effective_service_name(&self) -> String {
        match &self.service_namespace {
            Some(namespace) if !namespace.is_empty() => {
                format!("{}.{}", self.service_name, namespace)
            }
            _ => self.service_name.clone(),
        }
    }

    pub fn lookup(&self) -> Lookup {
        let mut lookup = Lookup::new(&self.effective_service_name());
        if let Some(port_name) = &self.port_name {
            lookup = lookup.with_port_name(port_name);
        }
        if let Some(protocol) = &self.protocol {
            lookup = lookup.with_protocol(protocol);
        }
        lookup
    }
}

impl Default for ContactPointDiscoverySettings {
    fn default() -> Self {
        Self {
            service_name: "cluster".to_string(),
            service_namespace: None,
            port_name: None,
            protocol: Some("tcp".to_string()),
            interval: Duration::from_secs(1),
            exponential_backoff_max: Duration::from_secs(15),
            exponential_backoff_random_factor: 0.2,
            resolve_timeout: Duration::from_secs(3),
            required_contact_points_nr: 2,
            contact_with_all_contact_points: true,
            stable_margin: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContactPointSettings {
    pub fallback_port: u16,
    /// Drop targets on other ports when a host is reported several times.
    pub filter_on_fallback_port: bool,
    pub probe_interval: Duration,
    pub probe_interval_jitter: f64,
    /// Per-request timeout and the silence after which a prober gives up.
    pub probing_failure_timeout: Duration,
}

impl Default for ContactPointSettings {
    fn default() -> Self {
        Self {
            fallback_port: DEFAULT_MANAGEMENT_PORT,
            filter_on_fallback_port: true,
            probe_interval: Duration::from_secs(1),
            probe_interval_jitter: 0.2,
            probing_failure_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterBootstrapSettings {
    pub contact_point_discovery: ContactPointDiscoverySettings,
    pub contact_point: ContactPointSettings,
    /// When false this node never forms a new cluster, it only joins existing ones.
    pub new_cluster_enabled: bool,
    /// Path prefix of the management endpoint, without slashes.
    pub management_base_path: Option<String>,
}

impl Default for ClusterBootstrapSettings {
    fn default() -> Self {
        Self {
            contact_point_discovery: ContactPointDiscoverySettings::default(),
            contact_point: ContactPointSettings::default(),
            new_cluster_enabled: true,
            management_base_path: None,
        }
    }
}

impl ClusterBootstrapSettings {
    pub fn for_service(service_name: &str) -> Self {
        let mut settings = Self::default();
        settings.contact_point_discovery.service_name = service_name.to_string();
        settings
    }

    pub fn validate(&self) -> Result<(), BootstrapError> {
        let discovery = &self.contact_point_discovery;
        let contact_point = &self.contact_point;

        if discovery.service_name.trim().is_empty() {
            return Err(invalid("service name must not be empty"));
        }
        if discovery.interval.is_zero() {
            return Err(invalid("discovery interval must be positive"));
        }
        if discovery.exponential_backoff_max < discovery.interval {
            return Err(invalid(
                "exponential backoff max must not be shorter than the discovery interval",
            ));
        }
        if !(0.0..=1.0).contains(&discovery.exponential_backoff_random_factor) {
            return Err(invalid("exponential backoff random factor must be within [0, 1]"));
        }
        if discovery.resolve_timeout.is_zero() {
            return Err(invalid("resolve timeout must be positive"));
        }
        if discovery.required_contact_points_nr == 0 {
            return Err(invalid("required contact points must be at least 1"));
        }
        if contact_point.probe_interval.is_zero() {
            return Err(invalid("probe interval must be positive"));
        }
        if !(0.0..=1.0).contains(&contact_point.probe_interval_jitter) {
            return Err(invalid("probe interval jitter must be within [0, 1]"));
        }
        if contact_point.probing_failure_timeout.is_zero() {
            return Err(invalid("probing failure timeout must be positive"));
        }
        if self
            .management_base_path
            .as_deref()
            .is_some_and(|path| path.contains("//"))
        {
            return Err(invalid("management base path contains an empty segment"));
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> BootstrapError {
    BootstrapError::InvalidSettings(reason.to_string())
}
