// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the shared resources of the pipeline: a temp
//! SQLite queue and an in-memory row store, plus a configuration that
//! points at them. Tests build intake and workers on top.

use std::sync::Arc;
use std::time::Duration;

use chatsink_config::model::{ChatsinkConfig, QueueConfig, StoreConfig, WorkerConfig};
use chatsink_core::types::Row;
use chatsink_core::ChatsinkError;
use chatsink_storage::SqliteQueue;

use crate::mock_store::MockStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    max_attempts: u32,
    store_latency: Option<Duration>,
    store_max_retries: u32,
    concurrency: usize,
    visibility_timeout_secs: Option<u64>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            max_attempts: 3,
            store_latency: None,
            store_max_retries: 2,
            concurrency: 1,
            visibility_timeout_secs: None,
        }
    }

    /// Deliveries allowed per job.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay every store call, widening race windows.
    pub fn with_store_latency(mut self, latency: Duration) -> Self {
        self.store_latency = Some(latency);
        self
    }

    /// In-resolver retries for transient store errors.
    pub fn with_store_retries(mut self, retries: u32) -> Self {
        self.store_max_retries = retries;
        self
    }

    /// Visibility lock per delivery. Zero makes every lock expire at once,
    /// so a job can be redelivered while a worker still runs it.
    pub fn with_visibility_timeout_secs(mut self, secs: u64) -> Self {
        self.visibility_timeout_secs = Some(secs);
        self
    }

    /// Number of workers the configuration asks for.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Build the test harness, creating the temp queue database.
    pub async fn build(self) -> Result<TestHarness, ChatsinkError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ChatsinkError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("queue.db");

        let defaults = QueueConfig::default();
        let config = ChatsinkConfig {
            store: StoreConfig {
                url: Some("http://store.invalid".to_string()),
                service_key: Some("test-service-key".to_string()),
                max_retries: self.store_max_retries,
                ..StoreConfig::default()
            },
            queue: QueueConfig {
                database_path: db_path.to_string_lossy().to_string(),
                max_attempts: self.max_attempts,
                // Retries become visible immediately so tests need not sleep.
                backoff_base_ms: 0,
                backoff_max_ms: 0,
                visibility_timeout_secs: self
                    .visibility_timeout_secs
                    .unwrap_or(defaults.visibility_timeout_secs),
                ..defaults
            },
            worker: WorkerConfig {
                concurrency: self.concurrency,
                poll_interval_ms: 10,
            },
            ..ChatsinkConfig::default()
        };

        let queue = Arc::new(SqliteQueue::open(&config.queue).await?);

        let mut store = MockStore::new();
        if let Some(latency) = self.store_latency {
            store = store.with_latency(latency);
        }

        Ok(TestHarness {
            store: Arc::new(store),
            queue,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock store and temp queue.
pub struct TestHarness {
    /// In-memory row store.
    pub store: Arc<MockStore>,
    /// SQLite queue (temp DB, cleaned up on drop).
    pub queue: Arc<SqliteQueue>,
    /// Configuration pointing at the temp resources.
    pub config: ChatsinkConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn users(&self) -> Vec<Row> {
        self.store.rows("users").await
    }

    pub async fn conversations(&self) -> Vec<Row> {
        self.store.rows("conversations").await
    }

    pub async fn participants(&self) -> Vec<Row> {
        self.store.rows("conversation_participants").await
    }

    pub async fn messages(&self) -> Vec<Row> {
        self.store.rows("messages").await
    }
}
