//! Discovery error types

use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to list network interfaces: {0}")]
    Interfaces(String),
    #[error("Reverse lookup failed for {address}: {source}")]
    Resolve {
        address: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },
    #[error("Reverse lookup for {address} timed out after {timeout:?}")]
    ResolveTimeout { address: Ipv4Addr, timeout: Duration },
    #[error("Worker pool is shut down")]
    PoolShutdown,
}
