// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for chatsink.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level chatsink configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. Every section defaults, but the store credentials have no
/// usable default and are checked before any worker starts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatsinkConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Relational store endpoint and credentials.
    #[serde(default)]
    pub store: StoreConfig,

    /// Durable queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Ingestion worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Webhook listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in log output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "chatsink".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Relational store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Base URL of the REST endpoint, e.g. `https://project.example.co`.
    #[serde(default)]
    pub url: Option<String>,

    /// Elevated-privilege service key. Bypasses row-level security so the
    /// pipeline can create users and conversations.
    #[serde(default)]
    pub service_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,

    /// In-resolver retries for transient store errors before surfacing.
    #[serde(default = "default_store_max_retries")]
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            timeout_secs: default_store_timeout_secs(),
            max_retries: default_store_max_retries(),
        }
    }
}

fn default_store_timeout_secs() -> u64 {
    10
}

fn default_store_max_retries() -> u32 {
    2
}

/// Durable queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Path to the SQLite database that holds the queue.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Name of the queue shared by intake and workers.
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Deliveries allowed per job before it is failed for good.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How long a dequeued job stays invisible to other workers.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// First retry delay; doubled on each further attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on the retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            name: default_queue_name(),
            max_attempts: default_max_attempts(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chatsink").join("queue.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatsink-queue.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_queue_name() -> String {
    "message-queue".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

/// Ingestion worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of concurrent worker tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Sleep between polls when the queue is idle.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Webhook listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted webhook body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    // Media events carry base64 thumbnails.
    5 * 1024 * 1024
}
