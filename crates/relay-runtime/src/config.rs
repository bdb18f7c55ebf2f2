//! # Runtime Configuration
//!
//! Unified configuration for the relay, loaded from environment variables
//! with sane defaults.
//!
//! ## Security Requirements
//!
//! - `require_signature` without a configured secret is a startup error:
//!   there is nothing to verify against, so the combination can only
//!   reject every request.

use std::str::FromStr;
use std::time::Duration;

use relay_gateway::GatewayConfig;
use relay_store::{GovernorConfig, RetentionConfig};
use thiserror::Error;
use tracing::warn;

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// HTTP surface configuration.
    pub gateway: GatewayConfig,
    /// Store retention bounds.
    pub retention: RetentionConfig,
    /// Governor tuning.
    pub governor: GovernorConfig,
    /// Shared webhook secret. Absent means signature verification is
    /// skipped with a warning (permissive default).
    pub webhook_secret: Option<String>,
    /// Reject unsigned webhook deliveries outright.
    pub require_signature: bool,
}

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Signature enforcement enabled without a secret to verify against.
    #[error(
        "RELAY_REQUIRE_SIGNATURE is set but RELAY_WEBHOOK_SECRET is not; \
         every delivery would be rejected"
    )]
    RequiredSignatureWithoutSecret,
}

impl RelayConfig {
    /// Load configuration from `RELAY_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = parsed(&lookup, "RELAY_HOST") {
            config.gateway.host = host;
        }
        if let Some(port) = parsed(&lookup, "RELAY_PORT") {
            config.gateway.port = port;
        }
        if let Some(max_body) = parsed(&lookup, "RELAY_MAX_BODY_BYTES") {
            config.gateway.max_body_bytes = max_body;
        }
        if let Some(capacity) = parsed(&lookup, "RELAY_BROADCAST_CAPACITY") {
            config.gateway.broadcast_capacity = capacity;
        }

        if let Some(max_events) = parsed(&lookup, "RELAY_MAX_EVENTS") {
            config.retention.max_events = max_events;
        }
        if let Some(age_secs) = parsed::<u64>(&lookup, "RELAY_MAX_EVENT_AGE_SECS") {
            config.retention.max_age = Duration::from_secs(age_secs);
        }

        if let Some(interval_secs) = parsed::<u64>(&lookup, "RELAY_CLEANUP_INTERVAL_SECS") {
            config.governor.min_interval = Duration::from_secs(interval_secs);
        }
        if let Some(batch) = parsed(&lookup, "RELAY_MAX_EVICTIONS_PER_PASS") {
            config.governor.max_evictions_per_pass = batch;
        }

        config.webhook_secret = lookup("RELAY_WEBHOOK_SECRET").filter(|s| !s.is_empty());
        config.require_signature = lookup("RELAY_REQUIRE_SIGNATURE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        config
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.require_signature && self.webhook_secret.is_none() {
            return Err(ConfigError::RequiredSignatureWithoutSecret);
        }
        Ok(())
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
