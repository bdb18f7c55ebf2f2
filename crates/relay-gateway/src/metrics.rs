//! Ingestion counters for the metrics endpoint.
//!
//! Counters only; the governor and broadcaster carry their own stats and
//! the handler assembles all three into one JSON document.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_types::RejectReason;

/// Counters for webhook ingestion outcomes.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Webhook deliveries received, before any validation.
    received: AtomicU64,
    /// Fresh events accepted into the store.
    accepted: AtomicU64,
    /// Valid events dropped as duplicates.
    duplicates: AtomicU64,
    /// Rejections by the signature validator.
    rejected_signature: AtomicU64,
    /// Rejections by the normalizer (any reason).
    rejected_malformed: AtomicU64,
    /// Normalizer rejections broken down by reason label.
    rejected_by_reason: Mutex<HashMap<&'static str, u64>>,
    /// Deliveries accepted without signature verification.
    unverified: AtomicU64,
}

impl IngestMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signature_rejection(&self) {
        self.rejected_signature.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, reason: &RejectReason) {
        self.rejected_malformed.fetch_add(1, Ordering::Relaxed);
        *self
            .rejected_by_reason
            .lock()
            .entry(reason.label())
            .or_insert(0) += 1;
    }

    pub fn record_unverified(&self) {
        self.unverified.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot as JSON for the metrics endpoint.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "received": self.received.load(Ordering::Relaxed),
            "accepted": self.accepted.load(Ordering::Relaxed),
            "duplicates": self.duplicates.load(Ordering::Relaxed),
            "rejectedSignature": self.rejected_signature.load(Ordering::Relaxed),
            "rejectedMalformed": self.rejected_malformed.load(Ordering::Relaxed),
            "rejectedByReason": self.rejected_by_reason.lock().clone(),
            "unverified": self.unverified.load(Ordering::Relaxed),
        })
    }
}
