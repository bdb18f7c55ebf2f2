//! # Relay Store - Bounded Deduplicating Event Storage
//!
//! The only shared mutable state in the relay: a time- and count-bounded
//! in-memory collection of completion events keyed by deterministic id,
//! plus the resource governor that keeps it bounded.
//!
//! Store exhaustion is never an error condition. When retention limits are
//! hit the oldest events are silently dropped; callers needing durability
//! must not rely on unbounded history.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod governor;
pub mod store;

pub use governor::{GovernorConfig, GovernorStatsSnapshot, ResourceGovernor};
pub use store::{EventStore, EvictionReport, RetentionConfig};
