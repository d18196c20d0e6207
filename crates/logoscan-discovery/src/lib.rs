//! logoscan Discovery - Network discovery for LOGO! controllers
//!
//! This crate provides the discovery engine:
//! - Subnet enumeration over every non-loopback IPv4 interface
//! - Bounded TCP connect probing of port 102 with reverse-DNS naming
//! - A bounded worker pool and the scan-cycle scheduler that drives it
//! - A serialized result sink feeding the host's device registry

pub mod config;
pub mod enumerator;
pub mod error;
pub mod pool;
pub mod probe;
pub mod scheduler;
pub mod service;
pub mod sink;

pub use config::DiscoveryConfig;
pub use enumerator::{HostInterface, InterfaceAddress, InterfaceSource, SubnetEnumerator, SystemInterfaces};
pub use error::DiscoveryError;
pub use pool::{Termination, WorkerPool};
pub use probe::{Probe, Resolver, SystemResolver, TcpProber};
pub use scheduler::{Interrupter, ProbeScheduler, ScanState, ScanSummary};
pub use service::{DiscoveryEvent, DiscoveryService};
pub use sink::{BroadcastRegistry, DeviceRegistry, ResultSink};
