//! # Relay Gateway - HTTP Surface
//!
//! The external interface of the relay:
//!
//! - `POST /webhook/completions` - signed webhook ingestion
//! - `GET /events/stream` - push delivery over Server-Sent Events
//! - `GET /events/recent` - poll delivery with a `since` cursor
//! - `GET /health`, `GET /metrics` - operational endpoints
//!
//! All dependencies (store, governor, broadcaster, verifier) are injected
//! at construction; the gateway holds no global state.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod service;

pub use domain::{ConfigError, CorsConfig, GatewayConfig, GatewayError, RequestError};
pub use handlers::{AppState, SIGNATURE_HEADER};
pub use metrics::IngestMetrics;
pub use service::GatewayService;
