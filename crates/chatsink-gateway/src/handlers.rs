// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the webhook gateway.
//!
//! Handles POST /webhook, GET /webhook, GET /health.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatsink_core::types::AckResult;
use chatsink_ingest::IntakeError;
use serde::Serialize;
use tracing::{debug, error};

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// POST /webhook
///
/// Enqueues the body verbatim and acknowledges. Nothing is normalized or
/// written to the row store on this path.
pub async fn post_webhook(State(state): State<GatewayState>, body: Bytes) -> Response {
    match state.enqueuer.accept_body(&body).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(IntakeError::InvalidPayload { reason }) => {
            debug!(%reason, bytes = body.len(), "rejected webhook payload");
            (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: reason })).into_response()
        }
        Err(IntakeError::Unavailable(e)) => {
            error!(error = %e, "webhook payload could not be enqueued");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "queue unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /webhook
///
/// Endpoint verification. No side effects.
pub async fn get_webhook() -> Json<AckResult> {
    Json(AckResult::ok())
}

/// GET /health
pub async fn get_health() -> Json<AckResult> {
    Json(AckResult::ok())
}
