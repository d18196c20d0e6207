//! Device types for reporting discovered controllers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Stable identifier for a device, derived from its display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a DeviceId from an arbitrary name, replacing disallowed characters
    pub fn sanitized(name: &str) -> Self {
        Self(sanitize_id(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_id(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A device that accepted a connection on the probed port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Sanitized identifier, safe to use as an external registry key
    pub id: DeviceId,
    /// Display name (reverse-DNS host name, or the address when unresolved)
    pub name: String,
    /// Address that answered the probe
    pub address: Ipv4Addr,
    /// Port that accepted the connection
    pub port: u16,
    /// When the probe succeeded
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    /// Create a device record from a resolved display name
    pub fn new(name: String, address: Ipv4Addr, port: u16) -> Self {
        Self {
            id: DeviceId::sanitized(&name),
            name,
            address,
            port,
            discovered_at: Utc::now(),
        }
    }

    /// Create a device record named after its own address
    pub fn unresolved(address: Ipv4Addr, port: u16) -> Self {
        Self::new(address.to_string(), address, port)
    }
}
