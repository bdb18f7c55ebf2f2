//! # Relay Fanout - Event Distribution to Connected Readers
//!
//! Push-model delivery of newly stored events to many independent readers.
//!
//! ## Delivery Contract
//!
//! - Every event published is handed to every reader registered at the
//!   time of publication.
//! - A slow, lagging, or disconnecting reader never blocks the publisher
//!   or any other reader.
//! - Registration and deregistration are constant-time in the number of
//!   events already stored; a dropped [`Subscription`] cleans itself up.
//!
//! Readers that fall behind the channel buffer skip ahead (bounded
//! staleness); the poll path over the event store covers the gap.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broadcaster;
pub mod subscription;

pub use broadcaster::{EventBroadcaster, DEFAULT_CHANNEL_CAPACITY};
pub use subscription::{EventStream, Subscription};
