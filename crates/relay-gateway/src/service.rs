//! Gateway service - builds the router and runs the HTTP server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::watch;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use relay_fanout::EventBroadcaster;
use relay_ingest::WebhookVerifier;
use relay_store::{EventStore, ResourceGovernor};

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::handlers::{
    handle_event_stream, handle_recent_events, handle_webhook, health_check, metrics_snapshot,
    AppState,
};
use crate::metrics::IngestMetrics;
use crate::middleware::create_cors_layer;

/// The relay's HTTP surface.
///
/// All collaborators are constructed by the caller and injected here; the
/// service owns nothing but its configuration and the ingest counters.
pub struct GatewayService {
    config: GatewayConfig,
    state: AppState,
}

impl GatewayService {
    /// Create the service after validating the configuration.
    pub fn new(
        config: GatewayConfig,
        store: Arc<EventStore>,
        governor: Arc<ResourceGovernor>,
        broadcaster: Arc<EventBroadcaster>,
        verifier: Arc<WebhookVerifier>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let state = AppState {
            store,
            governor,
            broadcaster,
            verifier,
            metrics: Arc::new(IngestMetrics::new()),
        };

        Ok(Self { config, state })
    }

    /// Build the axum router.
    ///
    /// The SSE route lives outside the timeout layer: a long-lived stream
    /// is the point, not a stuck request.
    #[must_use]
    pub fn router(&self) -> Router {
        let timed = Router::new()
            .route("/webhook/completions", post(handle_webhook))
            .route("/events/recent", get(handle_recent_events))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_snapshot))
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(RequestBodyLimitLayer::new(self.config.max_body_bytes));

        let streaming = Router::new().route("/events/stream", get(handle_event_stream));

        timed
            .merge(streaming)
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer(&self.config.cors))
            .with_state(self.state.clone())
    }

    /// Bind and serve until the shutdown signal fires.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), GatewayError> {
        let addr = self.config.bind_addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %addr, "Gateway listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
                info!("Gateway shutting down");
            })
            .await?;

        Ok(())
    }
}
