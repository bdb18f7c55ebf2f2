//! # Resource Governor
//!
//! Bounds the store's memory and the cost of keeping it bounded:
//!
//! - eviction runs at most once per `min_interval`, however fast inserts
//!   arrive;
//! - each pass removes at most `max_evictions_per_pass` events, so pause
//!   times stay flat as the store grows;
//! - pass counters are exported for the metrics endpoint.
//!
//! The governor has no correctness obligations. If it stalls, the store
//! grows until the next successful pass; reads stay consistent throughout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::store::{EventStore, EvictionReport};

/// Tuning knobs for the governor.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Minimum time between eviction passes.
    pub min_interval: Duration,
    /// Maximum events removed in a single pass.
    pub max_evictions_per_pass: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(30),
            max_evictions_per_pass: 256,
        }
    }
}

/// Counters for eviction activity.
#[derive(Debug, Default)]
pub struct GovernorStats {
    /// Eviction passes that actually ran.
    pub passes: AtomicU64,
    /// `maybe_evict` calls suppressed by the interval throttle.
    pub throttled: AtomicU64,
    /// Total events evicted for age.
    pub evicted_by_age: AtomicU64,
    /// Total events evicted for overflow.
    pub evicted_by_overflow: AtomicU64,
}

/// Point-in-time view of [`GovernorStats`] for the metrics endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorStatsSnapshot {
    pub passes: u64,
    pub throttled: u64,
    pub evicted_by_age: u64,
    pub evicted_by_overflow: u64,
}

/// Periodically evicts expired and overflowing events from the store.
pub struct ResourceGovernor {
    store: Arc<EventStore>,
    config: GovernorConfig,
    last_pass: Mutex<Option<Instant>>,
    stats: GovernorStats,
}

impl ResourceGovernor {
    /// Create a governor for `store`.
    #[must_use]
    pub fn new(store: Arc<EventStore>, config: GovernorConfig) -> Self {
        Self {
            store,
            config,
            last_pass: Mutex::new(None),
            stats: GovernorStats::default(),
        }
    }

    /// Run an eviction pass unless one ran within `min_interval`.
    ///
    /// Cheap enough to call on every insert; under a sustained insert
    /// storm all but one call per interval return without touching the
    /// store. Returns the report when a pass ran.
    pub fn maybe_evict(&self) -> Option<EvictionReport> {
        {
            let mut last_pass = self.last_pass.lock();
            let now = Instant::now();
            match *last_pass {
                Some(at) if now.duration_since(at) < self.config.min_interval => {
                    self.stats.throttled.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                _ => *last_pass = Some(now),
            }
        }
        Some(self.run_pass())
    }

    /// Run an eviction pass unconditionally (used by the periodic task,
    /// which already ticks at the configured interval).
    pub fn run_pass(&self) -> EvictionReport {
        let report = self
            .store
            .evict_expired_and_overflow(Utc::now(), self.config.max_evictions_per_pass);

        self.stats.passes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .evicted_by_age
            .fetch_add(report.removed_by_age as u64, Ordering::Relaxed);
        self.stats
            .evicted_by_overflow
            .fetch_add(report.removed_by_overflow as u64, Ordering::Relaxed);

        report
    }

    /// Current counter values.
    #[must_use]
    pub fn snapshot(&self) -> GovernorStatsSnapshot {
        GovernorStatsSnapshot {
            passes: self.stats.passes.load(Ordering::Relaxed),
            throttled: self.stats.throttled.load(Ordering::Relaxed),
            evicted_by_age: self.stats.evicted_by_age.load(Ordering::Relaxed),
            evicted_by_overflow: self.stats.evicted_by_overflow.load(Ordering::Relaxed),
        }
    }

    /// The store this governor manages.
    #[must_use]
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }
}

/// Background task driving periodic eviction until shutdown.
pub async fn run(governor: Arc<ResourceGovernor>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(governor.config.min_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so startup is quiet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = governor.run_pass();
                if report.total() > 0 {
                    debug!(
                        removed = report.total(),
                        retained = governor.store.len(),
                        "Governor eviction pass"
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Resource governor shutting down");
                    return;
                }
            }
        }
    }
}
