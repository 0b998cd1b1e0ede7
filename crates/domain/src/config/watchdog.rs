use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Watchdog configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const MIN_POOL_SIZE: usize = 1;
pub const MAX_POOL_SIZE: usize = 512;

/// Health-check cadence and fan-out for the node watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// When false the scheduler is not spawned by `serve`.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Period between cycle attempts.
    #[serde(default = "d_interval_ms")]
    pub interval_ms: u64,
    /// Hard per-probe timeout.
    #[serde(default = "d_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Maximum probes in flight at once.  Clamped to
    /// `MIN_POOL_SIZE..=MAX_POOL_SIZE`.
    #[serde(default = "d_pool_size")]
    pub pool_size: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: d_interval_ms(),
            probe_timeout_ms: d_probe_timeout_ms(),
            pool_size: d_pool_size(),
        }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE)
    }
}

fn d_true() -> bool {
    true
}
fn d_interval_ms() -> u64 {
    10_000
}
fn d_probe_timeout_ms() -> u64 {
    1_000
}
fn d_pool_size() -> usize {
    32
}
