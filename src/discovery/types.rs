use async_trait::async_trait;
use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// A discovered endpoint that may host a peer's management interface.
///
/// Equality and hashing are structural over `(host, port, address)`, so the same
/// endpoint returned by two lookups is the same candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContactPointCandidate {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub address: Option<IpAddr>,
}

impl ContactPointCandidate {
    pub fn new(host: &str, port: Option<u16>) -> Self {
        Self {
            host: Some(host.to_string()),
            port,
            address: None,
        }
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// Host name to contact: the discovered host, else the resolved address.
    pub fn hostname(&self) -> Option<String> {
        self.host
            .clone()
            .or_else(|| self.address.map(|address| address.to_string()))
    }
}

impl fmt::Display for ContactPointCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.hostname().unwrap_or_else(|| "<unknown>".to_string());
        match self.port {
            Some(port) => write!(f, "{}:{}", host, port)?,
            None => write!(f, "{}", host)?,
        }
        if let (Some(address), Some(_)) = (self.address, &self.host) {
            write!(f, " ({})", address)?;
        }
        Ok(())
    }
}

fn address_octets(address: &IpAddr) -> Vec<u8> {
    match address {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Total order used for the lowest-address tie-break.
///
/// Resolved addresses are compared by their raw octets (candidates without one
/// sort first), then host, then port. Every node computes the same order for
/// the same set of candidates.
impl Ord for ContactPointCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.address.as_ref().map(address_octets);
        let rhs = other.address.as_ref().map(address_octets);

        lhs.cmp(&rhs)
            .then_with(|| self.host.cmp(&other.host))
            .then_with(|| self.port.cmp(&other.port))
    }
}

impl PartialOrd for ContactPointCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What to ask service discovery for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub service_name: String,
    /// Named port (e.g. an SRV port name). When set, the backend has already
    /// picked the right port for every target.
    pub port_name: Option<String>,
    pub protocol: Option<String>,
}

impl Lookup {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            port_name: None,
            protocol: None,
        }
    }

    pub fn with_port_name(mut self, port_name: &str) -> Self {
        self.port_name = Some(port_name.to_string());
        self
    }

    pub fn with_protocol(mut self, protocol: &str) -> Self {
        self.protocol = Some(protocol.to_string());
        self
    }
}

/// Pluggable service discovery backend (DNS, cloud APIs, static lists...).
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Resolve `lookup` into candidate endpoints.
    ///
    /// `resolve_timeout` is the caller's budget for the lookup; the caller also
    /// enforces it, so backends may use it for their own request deadlines.
    async fn lookup(
        &self,
        lookup: &Lookup,
        resolve_timeout: Duration,
    ) -> anyhow::Result<Vec<ContactPointCandidate>>;
}
