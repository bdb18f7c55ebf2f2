//! # Challenge Relay Node Runtime
//!
//! The main entry point for the relay service.
//!
//! ## Data Flow
//!
//! ```text
//! webhook POST ──→ SignatureVerifier ──→ Normalizer ──→ EventStore.insert
//!                                                            │ (fresh)
//!                                                            ↓
//!                                                     EventBroadcaster
//!                                                       │          │
//!                                                       ↓          ↓
//!                                                 SSE readers   (poll readers
//!                                                                query the
//!                                                                store directly)
//!
//! ResourceGovernor ──(periodic, throttled)──→ EventStore.evict
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Initialize tracing (env-filter, `info` fallback)
//! 2. Load configuration from `RELAY_*` environment variables
//! 3. Validate (signature enforcement requires a secret)
//! 4. Construct store → governor → broadcaster → verifier → gateway
//! 5. Spawn the governor task, signal handler, and serve until shutdown

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_fanout::EventBroadcaster;
use relay_gateway::GatewayService;
use relay_ingest::WebhookVerifier;
use relay_store::{governor, EventStore, ResourceGovernor};

use crate::config::RelayConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env();
    config.validate().context("Invalid configuration")?;

    info!(
        addr = %config.gateway.bind_addr(),
        max_events = config.retention.max_events,
        max_age_secs = config.retention.max_age.as_secs(),
        signature_required = config.require_signature,
        "Starting challenge relay"
    );
    if config.webhook_secret.is_none() {
        warn!("No webhook secret configured; deliveries will be accepted unverified");
    }

    let store = Arc::new(EventStore::new(config.retention.clone()));
    let governor = Arc::new(ResourceGovernor::new(
        Arc::clone(&store),
        config.governor.clone(),
    ));
    let broadcaster = Arc::new(EventBroadcaster::with_capacity(
        config.gateway.broadcast_capacity,
    ));

    let secret = config.webhook_secret.as_ref().map(|s| s.as_bytes().to_vec());
    let verifier = Arc::new(match (secret, config.require_signature) {
        (Some(secret), true) => WebhookVerifier::with_required_signature(secret),
        (secret, _) => WebhookVerifier::new(secret),
    });

    let gateway = GatewayService::new(
        config.gateway,
        Arc::clone(&store),
        Arc::clone(&governor),
        broadcaster,
        verifier,
    )
    .context("Creating gateway service")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let governor_task = tokio::spawn(governor::run(Arc::clone(&governor), shutdown_rx.clone()));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    gateway
        .serve(shutdown_rx)
        .await
        .context("Gateway server failed")?;

    governor_task.await.context("Governor task panicked")?;

    info!("Relay stopped");
    Ok(())
}
