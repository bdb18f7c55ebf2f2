//! # Core Domain Entities
//!
//! Defines the canonical completion event and the transient webhook
//! envelope it is normalized from.
//!
//! ## Two timestamps
//!
//! Every event carries two independently meaningful times:
//!
//! - `completed_at` - when the player actually finished the challenge
//!   (business time, reported by the upstream system)
//! - `received_at` - when the envelope was delivered to us (delivery time)
//!
//! Delivery time drives retention, ordering, and poll cursors. Business
//! time is advisory and is never used for eviction decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The event type literal an envelope must carry to be accepted.
pub const COMPLETION_EVENT_TYPE: &str = "challenge_completed";

/// A validated, normalized challenge completion event.
///
/// This is the canonical unit of distribution. Once inserted into the
/// store an event is immutable; it is only ever removed by eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    /// Deterministic identity: `{playerId}-{challengeId}-{envelopeTimestamp}`.
    ///
    /// The envelope timestamp is taken verbatim (not reformatted), so a
    /// redelivery of the same logical event reproduces the same id. This
    /// is the deduplication key.
    pub id: String,
    /// Player identifier (required, non-empty).
    pub player_id: String,
    /// Display name; templated from `player_id` when the upstream omits it.
    pub player_name: String,
    /// Challenge identifier (required, non-empty).
    pub challenge_id: String,
    /// Display name; templated from `challenge_id` when omitted.
    pub challenge_name: String,
    /// Business-event time (when the challenge was completed).
    pub completed_at: DateTime<Utc>,
    /// Points awarded, if the upstream reported any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    /// Delivery time, parsed from the envelope `timestamp` field.
    #[serde(rename = "timestamp")]
    pub received_at: DateTime<Utc>,
}

impl CompletionEvent {
    /// Compute the deterministic event id for a (player, challenge,
    /// envelope timestamp) triple.
    ///
    /// The raw envelope timestamp string is concatenated verbatim so that
    /// byte-identical redeliveries collapse to the same id.
    #[must_use]
    pub fn deterministic_id(player_id: &str, challenge_id: &str, envelope_timestamp: &str) -> String {
        format!("{player_id}-{challenge_id}-{envelope_timestamp}")
    }

    /// Default display name for a player that did not report one.
    #[must_use]
    pub fn default_player_name(player_id: &str) -> String {
        format!("Player {player_id}")
    }

    /// Default display name for a challenge that did not report one.
    #[must_use]
    pub fn default_challenge_name(challenge_id: &str) -> String {
        format!("Challenge {challenge_id}")
    }
}

/// The raw inbound webhook envelope, before validation.
///
/// All fields are optional at this layer; the normalizer decides what is
/// missing versus malformed and produces a structured rejection. The
/// envelope is transient and is never retained after normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    /// Must equal [`COMPLETION_EVENT_TYPE`] to be accepted.
    pub event_type: Option<String>,
    /// Nested completion payload (`playerId`, `challengeId`, ...).
    pub data: Option<serde_json::Value>,
    /// Delivery timestamp, RFC-3339.
    pub timestamp: Option<String>,
    /// Optional HMAC signature, `sha256=<hex>`.
    pub signature: Option<String>,
}
