//! logoscan Core - Core types, subnet math, and scan timing
//!
//! This crate provides the foundational types for the logoscan system:
//! - Discovered device records and sanitized identifiers
//! - Subnet expansion into candidate host addresses
//! - The ordered, deduplicated candidate set for one scan cycle
//! - Timing formulas that size worker pools and shutdown grace periods

pub mod candidates;
pub mod device;
pub mod subnet;
pub mod timing;

pub use candidates::CandidateSet;
pub use device::{sanitize_id, DeviceId, DiscoveredDevice};
pub use subnet::{host_addresses, SubnetError};
pub use timing::{
    grace_period, worker_count, CONNECT_TIMEOUT, LOGO_PORT, RESOLVE_TIMEOUT, SCAN_TIMEOUT,
};
