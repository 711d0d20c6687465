// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the webhook endpoint.

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use chatsink_config::model::GatewayConfig;
use chatsink_core::ChatsinkError;
use chatsink_ingest::Enqueuer;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Hands accepted payloads to the durable queue.
    pub enqueuer: Enqueuer,
}

/// Build the gateway router.
///
/// Routes:
/// - POST /webhook (enqueue payload)
/// - GET /webhook (liveness check used by the chat gateway)
/// - GET /health
pub fn router(state: GatewayState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            "/webhook",
            get(handlers::get_webhook).post(handlers::post_webhook),
        )
        .route("/health", get(handlers::get_health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the gateway until `cancel` fires.
///
/// In-flight requests are allowed to finish; a request that already
/// enqueued its payload always receives its acknowledgement.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ChatsinkError> {
    let app = router(state, config.max_body_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChatsinkError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ChatsinkError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
