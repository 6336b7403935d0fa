// ── Runtime configuration ──
//
// Plain structs consumed by the services. File and environment loading
// lives in `tallysync-config`; this crate only knows the resolved values.

use std::time::Duration;

use crate::routing::RoutingTable;

/// Timing of the subscription manager and its reconnection controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Pause between teardown and re-subscription in a reconnect cycle.
    pub cool_down: Duration,
    /// Extra delay before `force_reconnect` enters the cycle, absorbing
    /// bursts of near-simultaneous triggers.
    pub force_reconnect_delay: Duration,
    /// Minimum gap between two effective `check_status` samples.
    pub status_check_interval: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            cool_down: Duration::from_secs(2),
            force_reconnect_delay: Duration::from_millis(500),
            status_check_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    /// Period of the background health check.
    pub check_interval: Duration,
    /// Elapsed time without a data update after which the feed is
    /// presumed silently dead.
    pub stale_after: Duration,
    /// Upper bound for each connectivity probe.
    pub probe_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything a [`SyncContext`](crate::SyncContext) needs besides its
/// collaborators.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub realtime: RealtimeConfig,
    pub health: HealthConfig,
    pub routing: RoutingTable,
    /// Capacity of the broadcast event bus.
    pub bus_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            realtime: RealtimeConfig::default(),
            health: HealthConfig::default(),
            routing: RoutingTable::platform_default(),
            bus_capacity: 256,
        }
    }
}
