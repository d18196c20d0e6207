//! Scan timing constants and the formulas derived from them

use std::time::Duration;

/// ISO-on-TCP port served by LOGO! controllers
pub const LOGO_PORT: u16 = 102;

/// Per-address TCP connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Upper bound on a single reverse-DNS lookup
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a caller waits for a whole discovery cycle
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Time `stop` waits for in-flight probes: `ceil(1.5 * candidates) * connect_timeout`.
///
/// Queued probes wait behind the bounded pool and each may take up to one
/// connect timeout, so the wait scales with the candidate count.
pub fn grace_period(candidates: usize, connect_timeout: Duration) -> Duration {
    // ceil(1.5 * n) == (3n + 1) / 2 for non-negative integers
    let slots = candidates.saturating_mul(3).saturating_add(1) / 2;
    connect_timeout.saturating_mul(u32::try_from(slots).unwrap_or(u32::MAX))
}

/// Worker count for the probe pool: one less than available parallelism, at least one
pub fn worker_count(available_parallelism: usize) -> usize {
    available_parallelism.saturating_sub(1).max(1)
}
