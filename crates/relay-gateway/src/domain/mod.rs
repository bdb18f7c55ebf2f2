//! Domain types for the gateway: configuration and error taxonomy.

pub mod config;
pub mod error;

pub use config::{ConfigError, CorsConfig, GatewayConfig};
pub use error::{GatewayError, RequestError};
