//! Discovery configuration

use logoscan_core::timing::{CONNECT_TIMEOUT, LOGO_PORT, RESOLVE_TIMEOUT, SCAN_TIMEOUT};
use logoscan_core::worker_count;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Port probed on every candidate address
    #[serde(default = "default_port")]
    pub port: u16,
    /// TCP connect timeout per address, in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Reverse-DNS timeout per discovered device, in milliseconds
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
    /// Overall time a scan may run before it is cut short, in seconds
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    /// Interval between background scans, in seconds
    #[serde(default = "default_background_interval_secs")]
    pub background_interval_secs: u64,
    /// Probe worker count (derived from available parallelism when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            scan_timeout_secs: default_scan_timeout_secs(),
            background_interval_secs: default_background_interval_secs(),
            workers: None,
        }
    }
}

fn default_port() -> u16 {
    LOGO_PORT
}

fn default_connect_timeout_ms() -> u64 {
    CONNECT_TIMEOUT.as_millis() as u64
}

fn default_resolve_timeout_ms() -> u64 {
    RESOLVE_TIMEOUT.as_millis() as u64
}

fn default_scan_timeout_secs() -> u64 {
    SCAN_TIMEOUT.as_secs()
}

fn default_background_interval_secs() -> u64 {
    60
}

impl DiscoveryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn background_interval(&self) -> Duration {
        // A zero period would make the background interval panic
        Duration::from_secs(self.background_interval_secs.max(1))
    }

    /// Configured worker count, or one less than available parallelism
    pub fn workers(&self) -> usize {
        match self.workers {
            Some(n) => n.max(1),
            None => {
                let available = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                worker_count(available)
            }
        }
    }
}
