//! Contact Point Addressing
//!
//! All "is this endpoint me?" decisions and probe URI construction live here,
//! so IPv4, bracketed IPv6 and hostname handling is implemented exactly once.

use super::protocol::ENDPOINT_SEED_NODES;
use crate::discovery::types::{ContactPointCandidate, Lookup};
use crate::membership::types::Address;

use anyhow::Result;
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// `[::1]` -> `::1`. Anything else is returned unchanged.
pub fn strip_ipv6_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host)
}

/// Whether `target` refers to `self_host`.
///
/// Matches on the discovered host name, or when the textual resolved address
/// contains the host. The substring check lets `10.0.0.1` match a target
/// resolved to `::ffff:10.0.0.1`, but it also lets `10.0.0.1` match
/// `10.0.0.11`; keep hosts fully qualified.
pub fn host_matches(self_host: &str, target: &ContactPointCandidate) -> bool {
    let clean = strip_ipv6_brackets(self_host);
    if clean.is_empty() {
        return false;
    }

    target.host.as_deref() == Some(clean)
        || target
            .address
            .is_some_and(|address| address.to_string().contains(clean))
}

/// Host matches and, when the target carries a port, the port matches too.
pub fn matches_self(target: &ContactPointCandidate, self_host: &str, self_port: u16) -> bool {
    host_matches(self_host, target) && target.port.is_none_or(|port| port == self_port)
}

/// Host (bracket free) and port of a management URI.
pub fn uri_host_port(uri: &Url) -> Option<(String, u16)> {
    let host = uri.host_str()?;
    let port = uri.port_or_known_default()?;
    Some((strip_ipv6_brackets(host).to_string(), port))
}

fn normalized_host(host: &str) -> String {
    strip_ipv6_brackets(host).to_ascii_lowercase()
}

fn hosts_equal(lhs: &str, rhs: &str) -> bool {
    let lhs = normalized_host(lhs);
    let rhs = normalized_host(rhs);
    match (lhs.parse::<IpAddr>(), rhs.parse::<IpAddr>()) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => lhs == rhs,
    }
}

/// Whether a probe URI points at the given remoting address.
///
/// Used to catch discovery reporting remoting ports instead of management ports.
pub fn same_endpoint(uri: &Url, address: &Address) -> bool {
    let (Some(host), Some(port)) = (address.host.as_deref(), address.port) else {
        return false;
    };
    match uri_host_port(uri) {
        Some((uri_host, uri_port)) => uri_port == port && hosts_equal(&uri_host, host),
        None => false,
    }
}

/// `{scheme}://{host}:{port}[/{base_path}]` for a contact point.
pub fn contact_point_base_uri(
    scheme: &str,
    contact_point: &ContactPointCandidate,
    fallback_port: u16,
    base_path: Option<&str>,
) -> Result<Url> {
    let host = contact_point
        .hostname()
        .ok_or_else(|| anyhow::anyhow!("Contact point {} has no host", contact_point))?;
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host
    };
    let port = contact_point.port.unwrap_or(fallback_port);

    let path = base_path
        .map(|path| path.trim_matches('/'))
        .filter(|path| !path.is_empty())
        .map(|path| format!("/{}", path))
        .unwrap_or_default();

    let raw = format!("{}://{}:{}{}", scheme, host, port, path);
    Url::parse(&raw).map_err(|e| anyhow::anyhow!("Invalid contact point URI {}: {}", raw, e))
}

/// Seed-nodes endpoint below a management base URI.
pub fn seed_nodes_url(base_uri: &Url) -> Result<Url> {
    let raw = format!(
        "{}{}",
        base_uri.as_str().trim_end_matches('/'),
        ENDPOINT_SEED_NODES
    );
    Url::parse(&raw).map_err(|e| anyhow::anyhow!("Invalid seed nodes URI {}: {}", raw, e))
}

/// Filters discovery targets down to likely management endpoints.
///
/// Only applies when `filter_on_fallback_port` is set and no port name was
/// requested. A host reported once is kept as is. A host reported several
/// times keeps only the targets on `fallback_port`, unless none of them
/// carries a port at all.
pub fn select_hosts(
    lookup: &Lookup,
    fallback_port: u16,
    filter_on_fallback_port: bool,
    targets: &[ContactPointCandidate],
) -> HashSet<ContactPointCandidate> {
    if !filter_on_fallback_port || lookup.port_name.is_some() {
        return targets.iter().cloned().collect();
    }

    let mut by_host: HashMap<Option<String>, Vec<&ContactPointCandidate>> = HashMap::new();
    for target in targets {
        by_host.entry(target.hostname()).or_default().push(target);
    }

    by_host
        .into_values()
        .flat_map(|group| {
            if group.len() == 1 || group.iter().all(|target| target.port.is_none()) {
                group
            } else {
                group
                    .into_iter()
                    .filter(|target| target.port == Some(fallback_port))
                    .collect()
            }
        })
        .cloned()
        .collect()
}
