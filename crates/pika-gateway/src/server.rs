// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use pika_agent::Dispatcher;
use pika_core::{ChannelAdapter, PikaError};
use pika_security::Gate;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers;

/// Path Telegram posts updates to.
pub const WEBHOOK_PATH: &str = "/telegram/webhook";

/// How long shutdown waits for acknowledged updates to finish.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub gate: Arc<Gate>,
    pub dispatcher: Arc<Dispatcher>,
    /// Where replies are sent.
    pub channel: Arc<dyn ChannelAdapter>,
    /// Take the source address from forwarded headers.
    pub trust_forwarded_for: bool,
    /// Dispatch and delivery tasks for acknowledged updates.
    pub tasks: TaskTracker,
}

/// Gateway server configuration (mirrors `[server]` from pika-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the router:
/// - GET /health (unauthenticated)
/// - POST /telegram/webhook (transport-authenticated)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::get_health));

    let webhook_routes = Router::new()
        .route(WEBHOOK_PATH, post(handlers::post_webhook))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .layer(TraceLayer::new_for_http())
}

/// Binds to the configured address and serves until `shutdown` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), PikaError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PikaError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    let tasks = state.tasks.clone();
    let served = axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| PikaError::Internal(format!("gateway server error: {e}")));

    drain(&tasks, DRAIN_TIMEOUT).await;
    served?;

    tracing::info!("gateway stopped");
    Ok(())
}

/// Stops accepting new tasks and waits up to `timeout` for the running ones.
/// Returns `false` if some were still running when the timeout expired.
pub async fn drain(tasks: &TaskTracker, timeout: Duration) -> bool {
    tasks.close();
    if tasks.is_empty() {
        return true;
    }
    tracing::info!(pending = tasks.len(), "waiting for in-flight updates");
    match tokio::time::timeout(timeout, tasks.wait()).await {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(
                pending = tasks.len(),
                "in-flight updates still running at shutdown"
            );
            false
        }
    }
}
