//! Network map input: logical segments and hosts to materialize in NetBox.
//!
//! The document is a JSON list (or a single object) of records. Only
//! mappings with `"type": "segment"` or `"type": "host"` are recognized;
//! anything else is ignored.

use anyhow::{Context, Result};
use ipnetwork::IpNetwork;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

use crate::utils::{is_mac_address, normalize_mac};

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    pub network: IpNetwork,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub name: String,
    pub address: HostAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAddress {
    Ip(IpAddr),
    Mac(String),
    Unrecognized(String),
}

impl HostAddress {
    /// IP syntax wins; otherwise a six-byte hex MAC with `:` or `-` separators
    pub fn classify(raw: &str) -> Self {
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return HostAddress::Ip(ip);
        }
        if is_mac_address(raw) {
            return HostAddress::Mac(normalize_mac(raw));
        }
        HostAddress::Unrecognized(raw.to_string())
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            HostAddress::Ip(ip) => Some(*ip),
            _ => None,
        }
    }

    /// Address key as NetBox stores a host address: `<ip>/32` or `<ip>/128`
    pub fn host_key(&self) -> Option<String> {
        self.ip().map(|ip| match ip {
            IpAddr::V4(v4) => format!("{}/32", v4),
            IpAddr::V6(v6) => format!("{}/128", v6),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkMap {
    pub segments: Vec<Segment>,
    pub hosts: Vec<Host>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<serde_json::Value>,
}

/// Strict network parse: host bits must be zero; a bare address is a host network
fn parse_network(raw: &str) -> Option<IpNetwork> {
    let network: IpNetwork = raw.trim().parse().ok()?;
    if network.network() == network.ip() {
        Some(network)
    } else {
        None
    }
}

impl NetworkMap {
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(text).context("network map is not valid JSON")?;
        Ok(Self::from_value(doc))
    }

    pub fn from_value(doc: serde_json::Value) -> Self {
        let entries = match doc {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };

        let mut map = NetworkMap::default();
        for entry in entries {
            if !entry.is_object() {
                continue;
            }
            let raw: RawEntry = match serde_json::from_value(entry) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!("Ignoring network map entry: {}", e);
                    continue;
                }
            };
            let name = match raw.name {
                Some(n) if !n.is_empty() => n,
                _ => continue,
            };
            let address = match raw.address {
                Some(serde_json::Value::String(a)) if !a.is_empty() => a,
                _ => continue,
            };

            match raw.kind.as_deref() {
                Some("segment") => match parse_network(&address) {
                    Some(network) => map.segments.push(Segment { name, network }),
                    None => tracing::debug!("Ignoring segment {:?}: {:?} is not a network", name, address),
                },
                Some("host") => map.hosts.push(Host {
                    name,
                    address: HostAddress::classify(&address),
                }),
                _ => {}
            }
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.hosts.is_empty()
    }
}

/// Load the network map. A missing file yields `None`.
pub fn load(path: &Path) -> Result<Option<NetworkMap>> {
    if !path.is_file() {
        tracing::debug!("Network map {} not found", path.display());
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading network map {}", path.display()))?;
    NetworkMap::from_json(&text)
        .with_context(|| format!("parsing network map {}", path.display()))
        .map(Some)
}
