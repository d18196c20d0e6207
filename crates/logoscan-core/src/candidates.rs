//! Candidate address set for one scan cycle

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Ordered, deduplicated addresses to probe.
///
/// Iteration follows numeric address order so probe dispatch and logs are
/// reproducible between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    addresses: BTreeSet<Ipv4Addr>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single address, returning false if it was already present
    pub fn insert(&mut self, address: Ipv4Addr) -> bool {
        self.addresses.insert(address)
    }

    pub fn contains(&self, address: &Ipv4Addr) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.addresses.iter().copied()
    }
}

impl Extend<Ipv4Addr> for CandidateSet {
    fn extend<T: IntoIterator<Item = Ipv4Addr>>(&mut self, iter: T) {
        self.addresses.extend(iter);
    }
}

impl FromIterator<Ipv4Addr> for CandidateSet {
    fn from_iter<T: IntoIterator<Item = Ipv4Addr>>(iter: T) -> Self {
        Self {
            addresses: iter.into_iter().collect(),
        }
    }
}
