// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A `JobQueue` whose backing storage is gone.

use async_trait::async_trait;

use chatsink_core::traits::adapter::PluginAdapter;
use chatsink_core::traits::queue::JobQueue;
use chatsink_core::types::{AdapterType, HealthStatus, Job, Lease, RetryOutcome};
use chatsink_core::ChatsinkError;

/// Every write fails with a storage error; reads see an empty queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownQueue;

fn unavailable() -> ChatsinkError {
    ChatsinkError::Storage {
        source: "database is locked".into(),
    }
}

#[async_trait]
impl PluginAdapter for DownQueue {
    fn name(&self) -> &str {
        "down-queue"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Queue
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatsinkError> {
        Ok(HealthStatus::Unhealthy("database is locked".into()))
    }
}

#[async_trait]
impl JobQueue for DownQueue {
    async fn enqueue(&self, _job_type: &str, _payload: &str) -> Result<i64, ChatsinkError> {
        Err(unavailable())
    }

    async fn dequeue(&self) -> Result<Option<Job>, ChatsinkError> {
        Ok(None)
    }

    async fn ack(&self, _lease: &Lease) -> Result<(), ChatsinkError> {
        Err(unavailable())
    }

    async fn retry(&self, _lease: &Lease, _error: &str) -> Result<RetryOutcome, ChatsinkError> {
        Err(unavailable())
    }

    async fn fail(&self, _lease: &Lease, _error: &str) -> Result<(), ChatsinkError> {
        Err(unavailable())
    }
}
