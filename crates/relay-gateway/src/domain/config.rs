//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8090)
    pub port: u16,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Maximum webhook body size in bytes
    pub max_body_bytes: usize,
    /// Per-request timeout (does not apply to the SSE stream)
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Per-subscriber fan-out buffer size
    pub broadcast_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8090,
            cors: CorsConfig::default(),
            max_body_bytes: 64 * 1024,
            request_timeout: Duration::from_secs(10),
            broadcast_capacity: 256,
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }
        if self.request_timeout.as_millis() == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "broadcast_capacity cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Get server bind address
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS handling
    pub enabled: bool,
    /// Allowed origins ("*" for any)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers ("*" for any)
    pub allowed_headers: Vec<String>,
    /// Preflight cache lifetime in seconds
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["*".to_string()],
            max_age: 3600,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
