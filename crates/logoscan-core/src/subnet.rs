//! Subnet expansion into usable host addresses

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubnetError {
    #[error("Invalid subnet {address}/{prefix_len}: {reason}")]
    InvalidPrefix {
        address: Ipv4Addr,
        prefix_len: u8,
        reason: String,
    },
}

/// Every usable host address in the subnet containing `address`.
///
/// The network and broadcast addresses are excluded, so /31 and /32 blocks
/// have no usable hosts and yield an empty list.
pub fn host_addresses(address: Ipv4Addr, prefix_len: u8) -> Result<Vec<Ipv4Addr>, SubnetError> {
    let block = Ipv4Network::new(address, prefix_len).map_err(|e| SubnetError::InvalidPrefix {
        address,
        prefix_len,
        reason: e.to_string(),
    })?;

    let network = u32::from(block.network());
    let broadcast = u32::from(block.broadcast());

    if broadcast.saturating_sub(network) < 2 {
        return Ok(Vec::new());
    }

    Ok(((network + 1)..broadcast).map(Ipv4Addr::from).collect())
}
