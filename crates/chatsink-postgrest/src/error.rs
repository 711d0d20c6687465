// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of HTTP and transport failures onto the pipeline error taxonomy.

use std::time::Duration;

use chatsink_core::ChatsinkError;
use reqwest::StatusCode;
use serde::Deserialize;

/// PostgreSQL SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429) || status.is_server_error()
}

/// Classify a non-success response.
pub(crate) fn classify_response(table: &str, status: StatusCode, body: &str) -> ChatsinkError {
    let api_err: ApiErrorResponse = serde_json::from_str(body).unwrap_or_default();

    // PostgREST also answers 409 for foreign-key (23503) and exclusion
    // violations; only a uniqueness violation means the row already exists.
    let is_unique_violation = match api_err.code.as_deref() {
        Some(code) => code == UNIQUE_VIOLATION,
        None => status == StatusCode::CONFLICT,
    };
    if is_unique_violation {
        let detail = api_err
            .details
            .or(api_err.message)
            .unwrap_or_else(|| body.to_string());
        return ChatsinkError::ConstraintViolation {
            table: table.to_string(),
            detail,
        };
    }

    let summary = match (&api_err.code, &api_err.message) {
        (Some(code), Some(message)) => format!("store returned {status} ({code}): {message}"),
        (None, Some(message)) => format!("store returned {status}: {message}"),
        _ => format!("store returned {status}: {body}"),
    };

    if is_transient_status(status) {
        ChatsinkError::transient(summary)
    } else {
        ChatsinkError::Backend { message: summary }
    }
}

/// Classify a failure to complete the HTTP exchange at all.
pub(crate) fn classify_transport(err: reqwest::Error, timeout: Duration) -> ChatsinkError {
    if err.is_timeout() {
        return ChatsinkError::Timeout { duration: timeout };
    }
    ChatsinkError::Transient {
        message: format!("HTTP request failed: {err}"),
        source: Some(Box::new(err)),
    }
}
