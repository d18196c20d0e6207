//! Candidate enumeration from the host's attached subnets

use logoscan_core::{host_addresses, CandidateSet};
use std::net::IpAddr;
use tracing::{debug, trace, warn};

use crate::error::DiscoveryError;

/// An address assigned to a host interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub ip: IpAddr,
    pub prefix_len: u8,
}

/// A host network interface as seen by the enumerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInterface {
    pub name: String,
    pub loopback: bool,
    pub addresses: Vec<InterfaceAddress>,
}

/// Source of host network interfaces
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Result<Vec<HostInterface>, DiscoveryError>;
}

/// Reads interfaces from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<HostInterface>, DiscoveryError> {
        use network_interface::{NetworkInterface, NetworkInterfaceConfig};

        let interfaces = NetworkInterface::show()
            .map_err(|e| DiscoveryError::Interfaces(e.to_string()))?;

        Ok(interfaces.into_iter().map(host_interface).collect())
    }
}

/// Map an operating system interface to the enumerator's view of it
fn host_interface(iface: network_interface::NetworkInterface) -> HostInterface {
    use network_interface::Addr;

    // `internal` mirrors IFF_LOOPBACK where the platform reports it
    let loopback = iface.internal
        || iface.addr.iter().any(|addr| match addr {
            Addr::V4(v4) => v4.ip.is_loopback(),
            Addr::V6(v6) => v6.ip.is_loopback(),
        });

    // Addresses without a netmask carry no subnet to expand
    let addresses = iface
        .addr
        .iter()
        .filter_map(|addr| match addr {
            Addr::V4(v4) => v4.netmask.map(|mask| InterfaceAddress {
                ip: IpAddr::V4(v4.ip),
                prefix_len: u32::from(mask).count_ones() as u8,
            }),
            Addr::V6(v6) => v6.netmask.map(|mask| InterfaceAddress {
                ip: IpAddr::V6(v6.ip),
                prefix_len: u128::from(mask).count_ones() as u8,
            }),
        })
        .collect();

    HostInterface {
        name: iface.name,
        loopback,
        addresses,
    }
}

/// Expands every non-loopback IPv4 subnet into candidate addresses
pub struct SubnetEnumerator {
    source: Box<dyn InterfaceSource>,
}

impl SubnetEnumerator {
    pub fn new(source: Box<dyn InterfaceSource>) -> Self {
        Self { source }
    }

    /// Enumerator backed by the operating system's interface list
    pub fn system() -> Self {
        Self::new(Box::new(SystemInterfaces))
    }

    /// Build the candidate set, treating interface listing failure as "no candidates"
    pub fn enumerate(&self) -> CandidateSet {
        match self.try_enumerate() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Interface enumeration failed, scanning nothing");
                CandidateSet::new()
            }
        }
    }

    /// Build the candidate set, surfacing interface listing failure
    pub fn try_enumerate(&self) -> Result<CandidateSet, DiscoveryError> {
        let mut candidates = CandidateSet::new();

        for iface in self.source.interfaces()? {
            if iface.loopback {
                trace!(interface = %iface.name, "Skipping loopback interface");
                continue;
            }

            for addr in &iface.addresses {
                let IpAddr::V4(ip) = addr.ip else {
                    continue;
                };

                match host_addresses(ip, addr.prefix_len) {
                    Ok(hosts) => {
                        debug!(
                            interface = %iface.name,
                            address = %ip,
                            prefix = addr.prefix_len,
                            hosts = hosts.len(),
                            "Expanding subnet"
                        );
                        candidates.extend(hosts);
                    }
                    Err(e) => {
                        warn!(interface = %iface.name, error = %e, "Skipping invalid subnet");
                    }
                }
            }
        }

        debug!("Enumerated {} candidate addresses", candidates.len());
        Ok(candidates)
    }
}
