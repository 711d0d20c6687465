// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook intake: validate that a payload is a JSON object and hand it to
//! the durable queue. No normalization or store access happens here, so the
//! gateway gets its acknowledgement as soon as the job is persisted.

use std::sync::Arc;

use chatsink_core::types::{AckResult, PROCESS_MESSAGE_JOB};
use chatsink_core::{ChatsinkError, JobQueue};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a webhook delivery was not accepted.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The body is not a JSON object. The caller should answer 400.
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// The queue could not persist the job. The caller should answer with a
    /// retryable status so the gateway redelivers.
    #[error(transparent)]
    Unavailable(#[from] ChatsinkError),
}

/// Accepts webhook payloads onto the queue.
#[derive(Clone)]
pub struct Enqueuer {
    queue: Arc<dyn JobQueue>,
}

impl Enqueuer {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Enqueue an already-parsed payload.
    pub async fn accept(&self, payload: &Value) -> Result<AckResult, IntakeError> {
        if !payload.is_object() {
            return Err(invalid(describe(payload)));
        }
        self.push(payload.to_string()).await
    }

    /// Enqueue a raw request body, storing the original text verbatim.
    pub async fn accept_body(&self, body: &[u8]) -> Result<AckResult, IntakeError> {
        let text = std::str::from_utf8(body).map_err(|e| invalid(format!("body is not UTF-8: {e}")))?;
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(_)) => self.push(text.to_string()).await,
            Ok(other) => Err(invalid(describe(&other))),
            Err(e) => Err(invalid(format!("body is not valid JSON: {e}"))),
        }
    }

    async fn push(&self, payload: String) -> Result<AckResult, IntakeError> {
        let id = self
            .queue
            .enqueue(PROCESS_MESSAGE_JOB, &payload)
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to enqueue webhook payload");
                ChatsinkError::Enqueue {
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                }
            })?;
        debug!(job_id = id, bytes = payload.len(), "webhook payload enqueued");
        Ok(AckResult::ok())
    }
}

fn invalid(reason: String) -> IntakeError {
    IntakeError::InvalidPayload { reason }
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    format!("expected a JSON object, got {kind}")
}
