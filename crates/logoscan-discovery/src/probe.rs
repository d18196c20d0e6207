//! TCP connect probing for LOGO! controllers

use async_trait::async_trait;
use logoscan_core::timing::{CONNECT_TIMEOUT, LOGO_PORT, RESOLVE_TIMEOUT};
use logoscan_core::DiscoveredDevice;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;

/// A single presence check against one candidate address
#[async_trait]
pub trait Probe: Send + Sync {
    /// Returns the device listening at `address`, or `None` if nothing answered
    async fn probe(&self, address: Ipv4Addr) -> Option<DiscoveredDevice>;
}

/// Reverse name resolution for discovered addresses
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn reverse(&self, address: Ipv4Addr) -> Result<String, DiscoveryError>;
}

/// Resolves names through the platform resolver, bounded by a timeout
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new(RESOLVE_TIMEOUT)
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn reverse(&self, address: Ipv4Addr) -> Result<String, DiscoveryError> {
        // getnameinfo blocks, so it runs on the blocking pool
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(address)));

        match timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(hostname))) => Ok(hostname),
            Ok(Ok(Err(source))) => Err(DiscoveryError::Resolve { address, source }),
            Ok(Err(join_error)) => Err(DiscoveryError::Resolve {
                address,
                source: std::io::Error::other(join_error),
            }),
            Err(_) => Err(DiscoveryError::ResolveTimeout {
                address,
                timeout: self.timeout,
            }),
        }
    }
}

/// Probes a fixed TCP port with a bounded connect attempt
pub struct TcpProber {
    port: u16,
    connect_timeout: Duration,
    resolver: Arc<dyn Resolver>,
}

impl TcpProber {
    pub fn new(port: u16, connect_timeout: Duration, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            port,
            connect_timeout,
            resolver,
        }
    }

    /// Prober using the system resolver and the settings from `config`
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(
            config.port,
            config.connect_timeout(),
            Arc::new(SystemResolver::new(config.resolve_timeout())),
        )
    }

    /// Display name for a responding address, falling back to the address itself
    async fn display_name(&self, address: Ipv4Addr) -> String {
        match self.resolver.reverse(address).await {
            Ok(hostname) => hostname,
            Err(e) => {
                debug!(address = %address, error = %e, "Name resolution failed, using address");
                address.to_string()
            }
        }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(LOGO_PORT, CONNECT_TIMEOUT, Arc::new(SystemResolver::default()))
    }
}

#[async_trait]
impl Probe for TcpProber {
    async fn probe(&self, address: Ipv4Addr) -> Option<DiscoveredDevice> {
        let endpoint = SocketAddr::new(IpAddr::V4(address), self.port);

        let mut stream = match timeout(self.connect_timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                trace!(address = %address, error = %e, "No device found");
                return None;
            }
            Err(_) => {
                trace!(address = %address, "No device found (connect timed out)");
                return None;
            }
        };

        info!(address = %address, port = self.port, "LOGO! device found");

        let name = self.display_name(address).await;
        let device = DiscoveredDevice::new(name, address, self.port);

        // The stream is released on drop either way; only the shutdown result is reported here
        if let Err(e) = stream.shutdown().await {
            warn!(address = %address, error = %e, "Failed to close probe connection");
        }

        Some(device)
    }
}
