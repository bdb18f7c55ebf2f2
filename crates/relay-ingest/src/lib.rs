//! # Relay Ingest - Webhook Validation and Normalization
//!
//! The ingestion path for inbound completion webhooks:
//!
//! 1. [`WebhookVerifier`] checks the HMAC-SHA256 signature over the raw
//!    body bytes (constant-time, permissive by default when unsigned).
//! 2. [`normalize`] turns the parsed payload into a canonical
//!    [`shared_types::CompletionEvent`] or a structured rejection.
//!
//! Both steps are stateless pure functions over their inputs; neither ever
//! panics on untrusted data.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod normalize;
pub mod signature;

pub use normalize::normalize;
pub use signature::{SignatureCheck, WebhookVerifier};
