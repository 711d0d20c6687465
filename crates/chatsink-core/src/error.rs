// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the chatsink ingestion pipeline.

use thiserror::Error;

/// Why a raw gateway event could not be turned into a `NormalizedMessage`.
///
/// Normalization failures are terminal: the payload is structurally
/// incomplete, so re-running the job cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// Neither a conversation key nor a sender address could be derived.
    #[error("missing identifiers: chat_id present = {has_chat_id}, sender present = {has_sender}")]
    MissingIdentifiers { has_chat_id: bool, has_sender: bool },
}

impl NormalizationError {
    /// Stable machine-readable reason, recorded on the failed job.
    pub fn reason(&self) -> &'static str {
        match self {
            NormalizationError::MissingIdentifiers { .. } => "missing_identifiers",
        }
    }
}

/// The primary error type used across all chatsink traits and pipeline stages.
#[derive(Debug, Error)]
pub enum ChatsinkError {
    /// Configuration errors (missing store credentials, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The raw event could not be normalized. Never retried.
    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    /// Retryable backend failure (timeout, connection reset, busy database, 5xx).
    #[error("transient backend error: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The store rejected a duplicate natural key.
    ///
    /// Expected under concurrent workers; the resolver absorbs it by re-reading.
    #[error("constraint violation on `{table}`: {detail}")]
    ConstraintViolation { table: String, detail: String },

    /// The store rejected a structurally valid request for a non-transient reason.
    #[error("backend rejected request: {message}")]
    Backend { message: String },

    /// Entity resolution failed for a non-transient reason.
    #[error("resolution failed for {entity} `{key}`: {message}")]
    Resolution {
        entity: &'static str,
        key: String,
        message: String,
    },

    /// The intake could not hand the payload to the queue.
    #[error("enqueue failed: {message}")]
    Enqueue {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Queue database errors (connection, query failure, migration).
    #[error("queue storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The job was redelivered after this consumer's visibility lock
    /// expired; the consumer no longer holds it and must drop its result.
    #[error("lease on job {job_id} is no longer held")]
    LeaseLost { job_id: i64 },

    /// An I/O call exceeded its timeout.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatsinkError {
    /// Shorthand for a transient error without an underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        ChatsinkError::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when re-running the failed operation may succeed.
    ///
    /// Only transient backend errors and timeouts qualify. Everything else is
    /// a terminal job failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChatsinkError::Transient { .. } | ChatsinkError::Timeout { .. }
        )
    }

    /// Returns true when a queue settlement was refused because the job had
    /// been handed to another consumer.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, ChatsinkError::LeaseLost { .. })
    }

    /// Returns true for duplicate-key rejections from the store.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, ChatsinkError::ConstraintViolation { .. })
    }
}
