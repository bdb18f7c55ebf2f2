//! # Event Normalization
//!
//! Turns an arbitrary inbound payload into a validated [`CompletionEvent`]
//! or a structured [`RejectReason`].
//!
//! The pipeline is a pure transformation: no side effects beyond warn-level
//! logs on recoverable oddities (an unparseable business timestamp). A
//! payload that fails any check is rejected with the first applicable
//! reason; nothing here panics on untrusted input.

use chrono::{DateTime, Utc};
use serde_json::Value;
use shared_types::{CompletionEvent, RejectReason, COMPLETION_EVENT_TYPE};
use tracing::warn;

/// Normalize a raw webhook body into a canonical completion event.
///
/// Checks, in order:
///
/// 1. the body is a JSON object;
/// 2. `eventType` equals [`COMPLETION_EVENT_TYPE`];
/// 3. `data` exists with non-empty `playerId` and `challengeId`
///    (numbers are coerced to their decimal string form);
/// 4. the envelope `timestamp` parses as RFC-3339.
///
/// The event id is the verbatim concatenation
/// `{playerId}-{challengeId}-{envelopeTimestamp}`, so a byte-identical
/// redelivery reproduces the same id. An unparseable `data.completedAt`
/// falls back to the envelope timestamp; business time is advisory,
/// delivery time is load-bearing.
///
/// # Errors
///
/// Returns the [`RejectReason`] for the first failed check.
pub fn normalize(raw: &Value) -> Result<CompletionEvent, RejectReason> {
    let envelope = raw.as_object().ok_or(RejectReason::NotAnObject)?;

    let event_type = envelope
        .get("eventType")
        .ok_or(RejectReason::MissingEventType)?;
    match event_type.as_str() {
        Some(t) if t == COMPLETION_EVENT_TYPE => {}
        _ => {
            return Err(RejectReason::WrongEventType {
                got: display_value(event_type),
            })
        }
    }

    let data = envelope
        .get("data")
        .and_then(Value::as_object)
        .ok_or(RejectReason::MissingData)?;

    let player_id = required_id(data.get("playerId"), "playerId")?;
    let challenge_id = required_id(data.get("challengeId"), "challengeId")?;

    let raw_timestamp = envelope
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or(RejectReason::MissingField { field: "timestamp" })?;
    let received_at = parse_rfc3339(raw_timestamp).ok_or_else(|| {
        RejectReason::UnparsableTimestamp {
            raw: raw_timestamp.to_string(),
        }
    })?;

    let completed_at = match data.get("completedAt").and_then(Value::as_str) {
        Some(raw_completed) => parse_rfc3339(raw_completed).unwrap_or_else(|| {
            warn!(
                completed_at = raw_completed,
                "Unparseable completedAt, falling back to envelope timestamp"
            );
            received_at
        }),
        None => received_at,
    };

    let player_name = data
        .get("playerName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(
            || CompletionEvent::default_player_name(&player_id),
            ToString::to_string,
        );
    let challenge_name = data
        .get("challengeName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(
            || CompletionEvent::default_challenge_name(&challenge_id),
            ToString::to_string,
        );

    Ok(CompletionEvent {
        id: CompletionEvent::deterministic_id(&player_id, &challenge_id, raw_timestamp),
        player_id,
        player_name,
        challenge_id,
        challenge_name,
        completed_at,
        points: data.get("points").and_then(Value::as_i64),
        received_at,
    })
}

/// Extract a required identifier, coercing numbers to strings.
///
/// Upstream integrators send ids as strings or bare numbers; both are
/// accepted. Anything else (null, bool, array, object) counts as missing.
fn required_id(value: Option<&Value>, field: &'static str) -> Result<String, RejectReason> {
    match value {
        None => Err(RejectReason::MissingField { field }),
        Some(Value::String(s)) if s.is_empty() => Err(RejectReason::EmptyField { field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(RejectReason::MissingField { field }),
    }
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Render a JSON value for error messages without quoting strings twice.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
