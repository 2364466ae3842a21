//! Centralized defaults for the load balancer.
//!
//! All tuning constants live here so the relationships between them stay
//! visible in one place.

use std::time::Duration;

/// How long an ownership record stays valid without renewal.
///
/// A record older than this is treated as abandoned and becomes claimable
/// by any instance. Crash recovery latency is bounded by this window plus
/// one balancing cycle, so lowering it speeds up failover at the cost of
/// more renewal traffic and less tolerance for store hiccups.
pub const DEFAULT_OWNERSHIP_EXPIRATION: Duration = Duration::from_secs(30);

/// Suggested delay between load balancing cycles.
///
/// The balancer itself is agnostic to cadence; the driver owns the timer.
/// One third of the expiration window gives each instance two retry
/// opportunities before its records expire.
pub const DEFAULT_LOAD_BALANCING_INTERVAL: Duration = Duration::from_secs(10);
