//! # Error Types
//!
//! Defines the rejection taxonomy for inbound webhook payloads.
//!
//! Normalization failures are values, not exceptions: every malformed
//! payload maps to exactly one `RejectReason` variant so call sites can
//! distinguish causes for observability without parsing log lines.

use thiserror::Error;

/// Why an inbound payload was rejected during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The body was not a JSON object (null, primitive, or array).
    #[error("Payload is not a JSON object")]
    NotAnObject,

    /// The envelope has no `eventType` field.
    #[error("Envelope is missing eventType")]
    MissingEventType,

    /// The envelope carries an event type we do not distribute.
    #[error("Unsupported event type: {got}")]
    WrongEventType { got: String },

    /// The envelope has no nested `data` object.
    #[error("Envelope is missing the data object")]
    MissingData,

    /// A required field is absent from `data`.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// A required field is present but empty.
    #[error("Required field is empty: {field}")]
    EmptyField { field: &'static str },

    /// The envelope `timestamp` could not be parsed as RFC-3339.
    ///
    /// Delivery time drives ordering and retention, so an event without a
    /// usable one is rejected rather than stored with a sentinel.
    #[error("Unparseable envelope timestamp: {raw}")]
    UnparsableTimestamp { raw: String },
}

impl RejectReason {
    /// Short machine-readable label for metrics and structured logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotAnObject => "not_an_object",
            Self::MissingEventType => "missing_event_type",
            Self::WrongEventType { .. } => "wrong_event_type",
            Self::MissingData => "missing_data",
            Self::MissingField { .. } => "missing_field",
            Self::EmptyField { .. } => "empty_field",
            Self::UnparsableTimestamp { .. } => "unparseable_timestamp",
        }
    }
}
