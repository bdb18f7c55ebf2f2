//! # Deduplicating Event Store
//!
//! An in-memory, time- and count-bounded collection of completion events
//! keyed by their deterministic id.
//!
//! ## Guarantees
//!
//! - `insert` is atomic with respect to its duplicate check-and-set: for
//!   any sequence of inserts with repeated ids, exactly the first insert
//!   of each id succeeds, even under concurrency.
//! - `recent_since` operates on a snapshot taken under the read lock, so a
//!   concurrent eviction can never remove an event from a result that has
//!   already decided to include it.
//! - Eviction is idempotent and safe to interleave with inserts.
//!
//! The dedup window equals the retention window: once an event is evicted
//! its id is forgotten, so memory stays bounded regardless of how long the
//! process runs.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use shared_types::CompletionEvent;
use tracing::debug;

/// Retention bounds for the store. Injected at construction, never
/// hardcoded at use sites.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Events older than this (by delivery time) are evicted.
    pub max_age: Duration,
    /// Hard cap on retained events; oldest evicted first when exceeded.
    pub max_events: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3600),
            max_events: 1000,
        }
    }
}

/// What a single eviction pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Events removed for exceeding the max age.
    pub removed_by_age: usize,
    /// Events removed to get back under the count cap.
    pub removed_by_overflow: usize,
}

impl EvictionReport {
    /// Total events removed in this pass.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.removed_by_age + self.removed_by_overflow
    }
}

struct StoreInner {
    /// Ids of currently retained events. The dedup set.
    seen: HashSet<String>,
    /// Retained events in insertion order (not necessarily delivery order;
    /// late arrivals land at the end and are sorted at query time).
    events: Vec<CompletionEvent>,
}

/// Thread-safe deduplicating event store.
///
/// All shared mutable state of the relay lives behind this one lock; every
/// operation takes it exactly once and never suspends while holding it.
pub struct EventStore {
    inner: RwLock<StoreInner>,
    config: RetentionConfig,
}

impl EventStore {
    /// Create an empty store with the given retention bounds.
    #[must_use]
    pub fn new(config: RetentionConfig) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                seen: HashSet::new(),
                events: Vec::new(),
            }),
            config,
        }
    }

    /// Insert an event unless its id has been retained before.
    ///
    /// Returns `true` for a fresh insert, `false` for a duplicate (which
    /// leaves the store untouched). The check-and-set happens under a
    /// single write lock, so two concurrent inserts of the same id can
    /// never both report success.
    pub fn insert(&self, event: CompletionEvent) -> bool {
        let mut inner = self.inner.write();
        if inner.seen.contains(&event.id) {
            debug!(id = %event.id, "Duplicate event ignored");
            return false;
        }
        inner.seen.insert(event.id.clone());
        inner.events.push(event);
        true
    }

    /// Whether an event with this id is currently retained.
    #[must_use]
    pub fn has_processed(&self, id: &str) -> bool {
        self.inner.read().seen.contains(id)
    }

    /// All retained events with delivery time at or after `cutoff`,
    /// newest-first.
    ///
    /// The result is a snapshot: events evicted after this returns are
    /// still present in the returned vector.
    #[must_use]
    pub fn recent_since(&self, cutoff: DateTime<Utc>) -> Vec<CompletionEvent> {
        let inner = self.inner.read();
        let mut matching: Vec<CompletionEvent> = inner
            .events
            .iter()
            .filter(|e| e.received_at >= cutoff)
            .cloned()
            .collect();
        drop(inner);

        // Stable sort keeps insertion order among equal timestamps.
        matching.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        matching
    }

    /// Delivery time of the most recent retained event, if any.
    #[must_use]
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .events
            .iter()
            .map(|e| e.received_at)
            .max()
    }

    /// Number of currently retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    /// Whether the store holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().events.is_empty()
    }

    /// Retention bounds this store was constructed with.
    #[must_use]
    pub const fn retention(&self) -> &RetentionConfig {
        &self.config
    }

    /// Remove expired events, then overflow beyond the count cap,
    /// removing at most `max_removals` events total.
    ///
    /// Expired events go first; if the store is still over `max_events`
    /// afterwards, the oldest-by-delivery-time events follow. Ids of
    /// evicted events are forgotten along with the events. Idempotent:
    /// a second pass with the same `now` removes nothing new (given no
    /// intervening inserts and a sufficient budget).
    pub fn evict_expired_and_overflow(
        &self,
        now: DateTime<Utc>,
        max_removals: usize,
    ) -> EvictionReport {
        let mut inner = self.inner.write();
        let mut report = EvictionReport::default();
        if max_removals == 0 || inner.events.is_empty() {
            return report;
        }

        // A max_age too large to represent as a cutoff means nothing is
        // old enough to expire.
        let cutoff = TimeDelta::from_std(self.config.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age));

        // Oldest first, so both passes walk the same ordering.
        let mut oldest_first: Vec<(DateTime<Utc>, String)> = inner
            .events
            .iter()
            .map(|e| (e.received_at, e.id.clone()))
            .collect();
        oldest_first.sort_by(|a, b| a.0.cmp(&b.0));

        let mut doomed: HashSet<String> = HashSet::new();

        if let Some(cutoff) = cutoff {
            for (received_at, id) in &oldest_first {
                if doomed.len() >= max_removals || *received_at >= cutoff {
                    break;
                }
                doomed.insert(id.clone());
                report.removed_by_age += 1;
            }
        }

        let mut remaining = inner.events.len() - doomed.len();
        if remaining > self.config.max_events {
            for (_, id) in oldest_first.iter() {
                if doomed.len() >= max_removals || remaining <= self.config.max_events {
                    break;
                }
                if doomed.contains(id) {
                    continue;
                }
                doomed.insert(id.clone());
                report.removed_by_overflow += 1;
                remaining -= 1;
            }
        }

        if !doomed.is_empty() {
            inner.events.retain(|e| !doomed.contains(&e.id));
            inner.seen.retain(|id| !doomed.contains(id));
            debug!(
                removed_by_age = report.removed_by_age,
                removed_by_overflow = report.removed_by_overflow,
                retained = inner.events.len(),
                "Eviction pass complete"
            );
        }

        report
    }
}
