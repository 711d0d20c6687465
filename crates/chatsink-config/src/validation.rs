// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express.
//! All checks collect errors instead of failing fast.

use crate::diagnostic::ConfigError;
use crate::model::ChatsinkConfig;

/// Store round trips one job can make: lookup, insert and re-read for the
/// sender and again for the conversation, the participant row, the message.
const STORE_CALLS_PER_JOB: u64 = 8;

/// Longest a worker may spend on one job before settling it, assuming every
/// store call times out and is retried.
fn worst_case_job_secs(config: &ChatsinkConfig) -> u64 {
    let tries = u64::from(config.store.max_retries).saturating_add(1);
    config
        .store
        .timeout_secs
        .saturating_mul(tries)
        .saturating_mul(STORE_CALLS_PER_JOB)
}

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ChatsinkConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.queue.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "queue.database_path must not be empty".to_string(),
        });
    }

    if config.queue.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "queue.name must not be empty".to_string(),
        });
    }

    if config.queue.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.max_attempts must be at least 1".to_string(),
        });
    }

    let job_budget_secs = worst_case_job_secs(config);
    if config.queue.visibility_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.visibility_timeout_secs must be at least 1".to_string(),
        });
    } else if config.queue.visibility_timeout_secs < job_budget_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.visibility_timeout_secs ({}) must cover a job's store calls: \
                 {STORE_CALLS_PER_JOB} calls x {} tries x store.timeout_secs ({}) = {job_budget_secs}s",
                config.queue.visibility_timeout_secs,
                config.store.max_retries.saturating_add(1),
                config.store.timeout_secs,
            ),
        });
    }

    if config.queue.backoff_max_ms < config.queue.backoff_base_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.backoff_max_ms ({}) must not be below queue.backoff_base_ms ({})",
                config.queue.backoff_max_ms, config.queue.backoff_base_ms
            ),
        });
    }

    if config.worker.concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.concurrency must be at least 1".to_string(),
        });
    }

    if config.store.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "store.timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Require the relational store endpoint and service key.
///
/// Only processes that talk to the store (workers) call this; intake-only
/// processes and queue maintenance commands run without credentials.
pub fn require_store_credentials(config: &ChatsinkConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match config.store.url.as_deref().map(str::trim) {
        None | Some("") => errors.push(ConfigError::missing("store.url")),
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
            errors.push(ConfigError::Validation {
                message: format!("store.url `{url}` must start with http:// or https://"),
            });
        }
        Some(_) => {}
    }

    if config
        .store
        .service_key
        .as_deref()
        .is_none_or(|k| k.trim().is_empty())
    {
        errors.push(ConfigError::missing("store.service_key"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
