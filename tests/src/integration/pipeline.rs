//! # Ingestion Pipeline Tests
//!
//! Exercise the full webhook path through the real router: signature
//! verification, normalization, dedup insert, and fan-out, plus the poll
//! endpoint contract on the way out.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sha2::Sha256;
    use tokio::time::timeout;
    use tower::util::ServiceExt;

    use relay_fanout::EventBroadcaster;
    use relay_gateway::{GatewayConfig, GatewayService, SIGNATURE_HEADER};
    use relay_ingest::WebhookVerifier;
    use relay_store::{EventStore, GovernorConfig, ResourceGovernor, RetentionConfig};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct TestRelay {
        router: Router,
        store: Arc<EventStore>,
        broadcaster: Arc<EventBroadcaster>,
    }

    fn build_relay(verifier: WebhookVerifier) -> TestRelay {
        let store = Arc::new(EventStore::new(RetentionConfig::default()));
        let governor = Arc::new(ResourceGovernor::new(
            Arc::clone(&store),
            GovernorConfig::default(),
        ));
        let broadcaster = Arc::new(EventBroadcaster::new());

        let service = GatewayService::new(
            GatewayConfig::default(),
            Arc::clone(&store),
            governor,
            Arc::clone(&broadcaster),
            Arc::new(verifier),
        )
        .expect("default gateway config is valid");

        TestRelay {
            router: service.router(),
            store,
            broadcaster,
        }
    }

    fn envelope(player: &str, challenge: &str, timestamp: &str) -> Value {
        json!({
            "eventType": "challenge_completed",
            "data": { "playerId": player, "challengeId": challenge },
            "timestamp": timestamp,
        })
    }

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("any key size works");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn post_webhook(body: &Value, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook/completions")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_string())).expect("request builds")
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body is JSON")
    }

    /// Read SSE frames from a live response body until `count` completion
    /// payloads have been parsed, returning their player ids in arrival
    /// order.
    async fn read_sse_players(body: &mut Body, count: usize) -> Vec<String> {
        let mut text = String::new();
        let mut players = Vec::new();
        while players.len() < count {
            let frame = timeout(Duration::from_secs(1), body.frame())
                .await
                .expect("frame arrives promptly")
                .expect("stream is open")
                .expect("frame reads");
            let Ok(data) = frame.into_data() else { continue };
            text.push_str(std::str::from_utf8(&data).expect("frames are utf-8"));

            while let Some(end) = text.find("\n\n") {
                let event: String = text.drain(..end + 2).collect();
                for line in event.lines() {
                    if let Some(payload) = line.strip_prefix("data: ") {
                        let value: Value =
                            serde_json::from_str(payload).expect("frame payload is JSON");
                        players.push(value["playerId"].as_str().expect("playerId").to_string());
                    }
                }
            }
        }
        players
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn signed_webhook_flows_to_store_and_readers() {
        let secret = b"integration-secret";
        let relay = build_relay(WebhookVerifier::new(Some(secret.to_vec())));
        let mut reader = relay.broadcaster.subscribe();

        let body = envelope("p1", "c1", "2024-01-01T00:00:00Z");
        let signature = sign(secret, body.to_string().as_bytes());

        let response = relay
            .router
            .oneshot(post_webhook(&body, Some(&signature)))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(relay.store.len(), 1);
        assert!(relay.store.has_processed("p1-c1-2024-01-01T00:00:00Z"));

        let delivered = timeout(Duration::from_secs(1), reader.recv())
            .await
            .expect("event delivered promptly")
            .expect("broadcaster still open");
        assert_eq!(delivered.id, "p1-c1-2024-01-01T00:00:00Z");
        assert_eq!(delivered.player_name, "Player p1");
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_before_the_store() {
        let relay = build_relay(WebhookVerifier::new(Some(b"right".to_vec())));
        let body = envelope("p1", "c1", "2024-01-01T00:00:00Z");
        let signature = sign(b"wrong", body.to_string().as_bytes());

        let response = relay
            .router
            .oneshot(post_webhook(&body, Some(&signature)))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(relay.store.is_empty());
    }

    #[tokio::test]
    async fn unsigned_delivery_is_accepted_under_permissive_policy() {
        let relay = build_relay(WebhookVerifier::new(Some(b"secret".to_vec())));
        let body = envelope("p1", "c1", "2024-01-01T00:00:00Z");

        let response = relay
            .router
            .oneshot(post_webhook(&body, None))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(relay.store.len(), 1);
    }

    #[tokio::test]
    async fn unsigned_delivery_is_rejected_when_signature_required() {
        let relay = build_relay(WebhookVerifier::with_required_signature(b"secret".to_vec()));
        let body = envelope("p1", "c1", "2024-01-01T00:00:00Z");

        let response = relay
            .router
            .oneshot(post_webhook(&body, None))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(relay.store.is_empty());
    }

    #[tokio::test]
    async fn redelivery_is_idempotent_end_to_end() {
        let relay = build_relay(WebhookVerifier::new(None));
        let body = envelope("p1", "c1", "2024-01-01T00:00:00Z");

        let mut duplicate_flags = Vec::new();
        for _ in 0..3 {
            let response = relay
                .router
                .clone()
                .oneshot(post_webhook(&body, None))
                .await
                .expect("router responds");
            assert_eq!(response.status(), StatusCode::OK);
            duplicate_flags.push(response_json(response).await["duplicate"].clone());
        }

        assert_eq!(duplicate_flags, vec![json!(false), json!(true), json!(true)]);
        assert_eq!(relay.store.len(), 1);
    }

    #[tokio::test]
    async fn invalid_envelopes_do_not_disturb_valid_ones() {
        let relay = build_relay(WebhookVerifier::new(None));

        let sequence = vec![
            (envelope("p1", "c1", "2024-01-01T00:00:01Z"), StatusCode::OK),
            (json!({"eventType": "wrong_type", "data": {"playerId": "px", "challengeId": "cx"}, "timestamp": "2024-01-01T00:00:02Z"}), StatusCode::BAD_REQUEST),
            (json!([1, 2, 3]), StatusCode::BAD_REQUEST),
            (envelope("p2", "c2", "2024-01-01T00:00:03Z"), StatusCode::OK),
            (json!({"eventType": "challenge_completed", "data": {"challengeId": "c9"}, "timestamp": "2024-01-01T00:00:04Z"}), StatusCode::BAD_REQUEST),
            (envelope("p3", "c3", "2024-01-01T00:00:05Z"), StatusCode::OK),
        ];

        for (body, expected_status) in sequence {
            let response = relay
                .router
                .clone()
                .oneshot(post_webhook(&body, None))
                .await
                .expect("router responds");
            assert_eq!(response.status(), expected_status);
        }

        let stored = relay.store.recent_since(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        let ids: Vec<&str> = stored.iter().map(|e| e.id.as_str()).collect();
        // Newest-first, only the valid three.
        assert_eq!(
            ids,
            vec![
                "p3-c3-2024-01-01T00:00:05Z",
                "p2-c2-2024-01-01T00:00:03Z",
                "p1-c1-2024-01-01T00:00:01Z",
            ]
        );
    }

    #[tokio::test]
    async fn poll_cursor_excludes_already_seen_events() {
        let relay = build_relay(WebhookVerifier::new(None));

        for (player, ts) in [("p1", "2024-01-01T00:00:01Z"), ("p2", "2024-01-01T00:10:00Z")] {
            let response = relay
                .router
                .clone()
                .oneshot(post_webhook(&envelope(player, "c1", ts), None))
                .await
                .expect("router responds");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = relay
            .router
            .oneshot(
                Request::get("/events/recent?since=2024-01-01T00:05:00Z")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["hasNewEvents"], true);
        let events = body["events"].as_array().expect("events array");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["playerId"], "p2");
    }

    #[tokio::test]
    async fn stream_replays_backlog_before_live_events() {
        let relay = build_relay(WebhookVerifier::new(None));

        // Two events land while the reader is disconnected.
        for (player, ts) in [("p1", "2024-01-01T00:00:01Z"), ("p2", "2024-01-01T00:00:02Z")] {
            let response = relay
                .router
                .clone()
                .oneshot(post_webhook(&envelope(player, "c1", ts), None))
                .await
                .expect("router responds");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = relay
            .router
            .clone()
            .oneshot(
                Request::get("/events/stream?since=2024-01-01T00:00:00Z")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"]
            .to_str()
            .expect("header is ascii")
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));

        // The retained backlog is replayed oldest-first.
        let mut body = response.into_body();
        let backlog = read_sse_players(&mut body, 2).await;
        assert_eq!(backlog, vec!["p1", "p2"]);

        // An event ingested after connect follows the backlog live.
        let live = relay
            .router
            .clone()
            .oneshot(post_webhook(
                &envelope("p3", "c1", "2024-01-01T00:00:03Z"),
                None,
            ))
            .await
            .expect("router responds");
        assert_eq!(live.status(), StatusCode::OK);

        assert_eq!(read_sse_players(&mut body, 1).await, vec!["p3"]);
    }
}
