//! Error types for the gateway.
//!
//! Two layers, mirroring the split between serving and request handling:
//! [`GatewayError`] covers service lifecycle failures surfaced to the
//! runtime; [`RequestError`] covers per-request rejections and maps onto
//! HTTP responses. Rejections are never 5xx: a malformed payload is the
//! sender's problem, not an internal failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared_types::RejectReason;
use thiserror::Error;

use super::config::ConfigError;

/// Service-level failures (startup, bind, shutdown).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The listener could not be bound or the server failed.
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-request rejections.
///
/// Signature rejections and malformed payloads share the 400 status so the
/// response does not reveal which validation tripped; they are
/// distinguished in logs and metrics only.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The body was not valid JSON.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// The payload failed normalization.
    #[error(transparent)]
    Rejected(#[from] RejectReason),

    /// The webhook signature did not verify.
    #[error("Signature verification failed")]
    SignatureInvalid,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::MalformedBody(detail) => format!("Malformed request body: {detail}"),
            Self::Rejected(reason) => reason.to_string(),
            Self::SignatureInvalid => "Request rejected".to_string(),
        };

        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "rejected", "error": message })),
        )
            .into_response()
    }
}
