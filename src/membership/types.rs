use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Remoting address of a cluster node.
///
/// Textual form is `protocol://system@host:port`. A purely local address
/// (`protocol://system`) carries neither host nor port. IPv6 hosts are kept in
/// their bracketed literal form (`[::1]`), which is how they appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub protocol: String,
    pub system: String,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Address {
    pub fn new(protocol: &str, system: &str, host: &str, port: u16) -> Self {
        Self {
            protocol: protocol.to_string(),
            system: system.to_string(),
            host: Some(host.to_string()),
            port: Some(port),
        }
    }

    /// `host:port` part of the address, if the address is remote.
    pub fn host_port(&self) -> Option<String> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some(format!("{}:{}", host, port)),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.system)?;
        if let Some(host_port) = self.host_port() {
            write!(f, "@{}", host_port)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, rest) = s
            .split_once("://")
            .ok_or_else(|| anyhow::anyhow!("Address [{}] is missing a protocol", s))?;

        if protocol.is_empty() {
            anyhow::bail!("Address [{}] has an empty protocol", s);
        }

        let Some((system, authority)) = rest.split_once('@') else {
            if rest.is_empty() {
                anyhow::bail!("Address [{}] has an empty system name", s);
            }
            return Ok(Self {
                protocol: protocol.to_string(),
                system: rest.to_string(),
                host: None,
                port: None,
            });
        };

        if system.is_empty() {
            anyhow::bail!("Address [{}] has an empty system name", s);
        }

        // rsplit keeps the colons of a bracketed IPv6 host intact
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("Address [{}] is missing a port", s))?;

        if host.is_empty() {
            anyhow::bail!("Address [{}] has an empty host", s);
        }

        let port: u16 = port
            .parse()
            .map_err(|e| anyhow::anyhow!("Address [{}] has an invalid port: {}", s, e))?;

        Ok(Self::new(protocol, system, host, port))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of a member as seen by the local membership view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemberStatus {
    Joining,
    WeaklyUp,
    Up,
    Leaving,
    Exiting,
    Down,
    Removed,
}

impl MemberStatus {
    /// Members in these states may be handed out as seed nodes.
    pub fn is_up(&self) -> bool {
        matches!(self, MemberStatus::Up | MemberStatus::WeaklyUp)
    }
}

/// A single member of the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub address: Address,
    pub status: MemberStatus,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}
