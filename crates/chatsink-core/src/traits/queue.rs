// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable work queue trait connecting intake and workers.

use async_trait::async_trait;

use crate::error::ChatsinkError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Job, Lease, RetryOutcome};

/// A named durable queue with single-delivery-in-flight semantics.
///
/// A dequeued job is invisible to other consumers until its visibility lock
/// expires. Workers must therefore tolerate redelivery of a job they (or a
/// crashed peer) already started.
///
/// Settling a job takes the [`Lease`] of the delivery being settled. Once the
/// job has been redelivered the old lease is stale and the settling call
/// fails with [`ChatsinkError::LeaseLost`] without touching the job.
#[async_trait]
pub trait JobQueue: PluginAdapter {
    /// Pushes a payload verbatim. Returns the new job id.
    async fn enqueue(&self, job_type: &str, payload: &str) -> Result<i64, ChatsinkError>;

    /// Takes the next deliverable job, or `None` when the queue is idle.
    async fn dequeue(&self) -> Result<Option<Job>, ChatsinkError>;

    /// Marks a job as completed.
    async fn ack(&self, lease: &Lease) -> Result<(), ChatsinkError>;

    /// Hands a job back after a transient failure, subject to backoff and the
    /// attempt budget.
    async fn retry(&self, lease: &Lease, error: &str) -> Result<RetryOutcome, ChatsinkError>;

    /// Marks a job as permanently failed without scheduling a retry.
    async fn fail(&self, lease: &Lease, error: &str) -> Result<(), ChatsinkError>;
}
