//! # Event Subscription
//!
//! The reading side of the fan-out. A [`Subscription`] is one connected
//! reader; dropping it is the disconnect signal, no coordination with the
//! broadcaster required.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use shared_types::CompletionEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Decrements the live-subscriber gauge when the reader goes away.
struct SubscriberGuard {
    subscribers: Arc<AtomicUsize>,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.subscribers.fetch_sub(1, Ordering::Relaxed);
        debug!("Reader unsubscribed");
    }
}

/// A handle for receiving events from the broadcaster.
///
/// When dropped, the registration is cleaned up automatically.
pub struct Subscription {
    receiver: broadcast::Receiver<CompletionEvent>,
    guard: SubscriberGuard,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<CompletionEvent>,
        subscribers: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            receiver,
            guard: SubscriberGuard { subscribers },
        }
    }

    /// Receive the next event.
    ///
    /// A lagged reader (one that fell further behind than the channel
    /// buffer) skips the overwritten events and continues from the oldest
    /// retained one; this is the bounded-staleness trade-off, and the
    /// skipped events remain reachable via the poll path. Returns `None`
    /// when the broadcaster has shut down.
    pub async fn recv(&mut self) -> Option<CompletionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Slow reader lagged, events skipped");
                }
            }
        }
    }

    /// Convert into a [`Stream`] of events for SSE wiring.
    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream {
            inner: BroadcastStream::new(self.receiver),
            _guard: self.guard,
        }
    }
}

/// Stream adapter over a [`Subscription`].
///
/// Lag gaps are absorbed the same way [`Subscription::recv`] absorbs them;
/// the stream ends when the broadcaster shuts down.
pub struct EventStream {
    inner: BroadcastStream<CompletionEvent>,
    _guard: SubscriberGuard,
}

impl Stream for EventStream {
    type Item = CompletionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    debug!(skipped, "Slow stream reader lagged, events skipped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
