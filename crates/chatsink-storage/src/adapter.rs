// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the JobQueue trait.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use chatsink_config::model::QueueConfig;
use chatsink_core::types::{Job, JobStatus, Lease, QueueStats, RetryOutcome};
use chatsink_core::{AdapterType, ChatsinkError, HealthStatus, JobQueue, PluginAdapter};

use crate::database::Database;
use crate::queries;
use crate::queries::queue::Backoff;

/// SQLite-backed durable queue bound to one queue name.
///
/// Cloning is cheap; clones share the same serialized connection.
#[derive(Clone)]
pub struct SqliteQueue {
    db: Database,
    queue_name: String,
    max_attempts: u32,
    visibility: Duration,
    backoff: Backoff,
}

impl SqliteQueue {
    /// Open the queue database described by `config`, running migrations.
    pub async fn open(config: &QueueConfig) -> Result<Self, ChatsinkError> {
        let db = Database::open(&config.database_path).await?;
        debug!(
            path = %config.database_path,
            queue = %config.name,
            "SQLite queue initialized"
        );
        Ok(Self::with_database(db, config))
    }

    /// Bind an already opened database to the queue settings in `config`.
    pub fn with_database(db: Database, config: &QueueConfig) -> Self {
        Self {
            db,
            queue_name: config.name.clone(),
            max_attempts: config.max_attempts,
            visibility: Duration::from_secs(config.visibility_timeout_secs),
            backoff: Backoff {
                base: Duration::from_millis(config.backoff_base_ms),
                max: Duration::from_millis(config.backoff_max_ms),
            },
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub async fn get(&self, id: i64) -> Result<Option<Job>, ChatsinkError> {
        queries::queue::get(&self.db, id).await
    }

    /// Newest jobs first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<JobStatus>,
        limit: u32,
    ) -> Result<Vec<Job>, ChatsinkError> {
        queries::queue::list(&self.db, &self.queue_name, status, limit).await
    }

    /// Re-arm a failed job. Returns `false` if no failed job has that id.
    pub async fn replay(&self, id: i64) -> Result<bool, ChatsinkError> {
        queries::queue::replay(&self.db, id).await
    }

    pub async fn stats(&self) -> Result<QueueStats, ChatsinkError> {
        queries::queue::stats(&self.db, &self.queue_name).await
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), ChatsinkError> {
        self.db.close().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteQueue {
    fn name(&self) -> &str {
        "sqlite-queue"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Queue
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatsinkError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl JobQueue for SqliteQueue {
    async fn enqueue(&self, job_type: &str, payload: &str) -> Result<i64, ChatsinkError> {
        queries::queue::enqueue(
            &self.db,
            &self.queue_name,
            job_type,
            payload,
            self.max_attempts,
        )
        .await
    }

    async fn dequeue(&self) -> Result<Option<Job>, ChatsinkError> {
        queries::queue::dequeue(&self.db, &self.queue_name, self.visibility).await
    }

    async fn ack(&self, lease: &Lease) -> Result<(), ChatsinkError> {
        queries::queue::ack(&self.db, lease).await
    }

    async fn retry(&self, lease: &Lease, error: &str) -> Result<RetryOutcome, ChatsinkError> {
        queries::queue::retry(&self.db, lease, error, self.backoff).await
    }

    async fn fail(&self, lease: &Lease, error: &str) -> Result<(), ChatsinkError> {
        queries::queue::fail(&self.db, lease, error).await
    }
}
