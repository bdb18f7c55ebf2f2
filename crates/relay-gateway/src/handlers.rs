//! Request handlers for the relay gateway.
//!
//! The webhook path is the only write path: signature check over the raw
//! body bytes, JSON parse, normalize, insert, publish. Read paths are the
//! SSE stream (push) and the poll endpoint, both backed by the same store
//! so they give the same ordering guarantees.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{CompletionEvent, RawEnvelope};
use tracing::{debug, info, warn};

use relay_fanout::EventBroadcaster;
use relay_ingest::{normalize, SignatureCheck, WebhookVerifier};
use relay_store::{EventStore, ResourceGovernor};

use crate::domain::error::RequestError;
use crate::metrics::IngestMetrics;

/// Header carrying the webhook signature (`sha256=<hex>`).
pub const SIGNATURE_HEADER: &str = "x-relay-signature";

/// SSE event name for completion frames.
const SSE_EVENT_NAME: &str = "completion";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EventStore>,
    pub governor: Arc<ResourceGovernor>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub verifier: Arc<WebhookVerifier>,
    pub metrics: Arc<IngestMetrics>,
}

/// Handle an inbound completion webhook.
///
/// Duplicates are not an error to the sender: redelivery of an already
/// stored event gets the same 200 as a fresh one, with `duplicate: true`
/// in the body. Only structurally invalid requests get a non-success
/// response, and signature failures share that status code.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, RequestError> {
    state.metrics.record_received();

    let raw: Value = serde_json::from_slice(&body).map_err(|e| {
        info!(error = %e, "Webhook body is not valid JSON");
        RequestError::MalformedBody(e.to_string())
    })?;

    // Signature from the conventional header, falling back to the
    // envelope's own field for integrators that cannot set headers.
    let header_signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let envelope: RawEnvelope = serde_json::from_value(raw.clone()).unwrap_or_default();
    let provided = header_signature.or(envelope.signature);

    let check = state.verifier.verify(&body, provided.as_deref());
    match check {
        SignatureCheck::Rejected => {
            state.metrics.record_signature_rejection();
            warn!(outcome = check.label(), "Webhook signature rejected");
            return Err(RequestError::SignatureInvalid);
        }
        SignatureCheck::SkippedUnsigned | SignatureCheck::SkippedNoSecret => {
            state.metrics.record_unverified();
        }
        SignatureCheck::Verified => {}
    }

    let event = normalize(&raw).map_err(|reason| {
        state.metrics.record_rejection(&reason);
        info!(reason = reason.label(), "Webhook payload rejected");
        reason
    })?;

    let fresh = state.store.insert(event.clone());
    if fresh {
        state.metrics.record_accepted();
        let delivered = state.broadcaster.publish(event.clone());
        debug!(
            id = %event.id,
            player = %event.player_id,
            challenge = %event.challenge_id,
            readers = delivered,
            "Completion event accepted"
        );
        // Piggyback cleanup on the write path; the governor throttles itself.
        state.governor.maybe_evict();
    } else {
        state.metrics.record_duplicate();
    }

    Ok(Json(json!({ "status": "ok", "duplicate": !fresh })))
}

/// Cursor query accepted by the stream and poll endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct CursorQuery {
    /// Last-seen delivery timestamp: RFC-3339 or unix milliseconds.
    pub since: Option<String>,
}

/// Push delivery: a long-lived SSE stream of completion events.
///
/// With a `since` cursor the retained backlog is replayed (oldest first)
/// before live events, so a briefly disconnected reader misses nothing
/// inside the retention window. The subscription is taken before the
/// backlog snapshot; a reader may therefore see an event twice at the
/// seam, but never a gap.
pub async fn handle_event_stream(
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let live = state.broadcaster.subscribe().into_stream();

    let backlog: Vec<CompletionEvent> = match query.since.as_deref().and_then(parse_cursor) {
        Some(cutoff) => {
            // recent_since is newest-first; replay wants oldest-first.
            let mut events = state.store.recent_since(cutoff);
            events.reverse();
            events
        }
        None => Vec::new(),
    };

    debug!(backlog = backlog.len(), "Reader connected to event stream");

    let frames = stream::iter(backlog)
        .chain(live)
        .map(|event| Ok(to_sse_frame(&event)));

    Sse::new(frames).keep_alive(KeepAlive::default())
}

/// Poll delivery: everything retained at or after the caller's cursor.
pub async fn handle_recent_events(
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> Json<RecentEventsResponse> {
    let cutoff = query
        .since
        .as_deref()
        .and_then(parse_cursor)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let events = state.store.recent_since(cutoff);
    let latest_timestamp = state
        .store
        .latest_timestamp()
        .map_or(0, |t| t.timestamp_millis());

    Json(RecentEventsResponse {
        has_new_events: !events.is_empty(),
        events,
        latest_timestamp,
    })
}

/// Response body of the poll endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEventsResponse {
    pub has_new_events: bool,
    pub events: Vec<CompletionEvent>,
    /// Unix milliseconds of the newest retained event; the caller's next
    /// cursor. Zero when the store is empty.
    pub latest_timestamp: i64,
}

/// Liveness probe.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Operational snapshot: store occupancy, fan-out gauges, ingest counters,
/// governor activity.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "store": {
            "events": state.store.len(),
            "maxEvents": state.store.retention().max_events,
        },
        "fanout": {
            "subscribers": state.broadcaster.subscriber_count(),
            "eventsPublished": state.broadcaster.events_published(),
        },
        "ingest": state.metrics.to_json(),
        "governor": state.governor.snapshot(),
    }))
}

fn to_sse_frame(event: &CompletionEvent) -> SseEvent {
    let frame = SseEvent::default().event(SSE_EVENT_NAME);
    match serde_json::to_string(event) {
        Ok(data) => frame.data(data),
        // CompletionEvent serialization cannot fail; keep the stream alive
        // regardless.
        Err(_) => frame.comment("serialization failure"),
    }
}

/// Parse a client cursor: unix milliseconds or an RFC-3339 timestamp.
fn parse_cursor(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
