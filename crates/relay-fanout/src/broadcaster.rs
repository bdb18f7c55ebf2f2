//! # Event Broadcaster
//!
//! The publishing side of the fan-out. One broadcaster per process,
//! constructed at startup and shared via `Arc`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use shared_types::CompletionEvent;
use tokio::sync::broadcast;
use tracing::debug;

use crate::subscription::Subscription;

/// Default events buffered per subscriber before the channel lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out hub delivering newly stored events to all current readers.
///
/// Built on `tokio::sync::broadcast`: each subscriber owns an independent
/// cursor into a bounded ring buffer, so a slow reader lags (and skips
/// ahead) without ever blocking the publisher or other readers.
/// Subscribing and unsubscribing are O(1) in the number of stored events.
pub struct EventBroadcaster {
    sender: broadcast::Sender<CompletionEvent>,
    /// Live subscriber gauge, maintained by `Subscription` lifecycle.
    subscribers: Arc<AtomicUsize>,
    events_published: AtomicU64,
}

impl EventBroadcaster {
    /// Create a broadcaster with the default per-subscriber buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broadcaster with a specific per-subscriber buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscribers: Arc::new(AtomicUsize::new(0)),
            events_published: AtomicU64::new(0),
        }
    }

    /// Deliver an event to every currently registered reader.
    ///
    /// Returns the number of readers the event was handed to. Zero simply
    /// means nobody is listening right now; that is not an error, and the
    /// event remains available through the store's poll path.
    pub fn publish(&self, event: CompletionEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Event published with no active subscribers");
                0
            }
        }
    }

    /// Register a new reader.
    ///
    /// The subscription starts at the current head of the channel: the
    /// reader sees every event published after this call. Backlog replay
    /// for reconnecting readers goes through the store, not the channel.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.subscribers.fetch_add(1, Ordering::Relaxed);
        debug!(
            subscribers = self.subscribers.load(Ordering::Relaxed),
            "Reader subscribed"
        );
        Subscription::new(self.sender.subscribe(), Arc::clone(&self.subscribers))
    }

    /// Number of currently connected readers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }

    /// Total events published since startup.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
