// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by queue and store backends.

use async_trait::async_trait;

use crate::error::ChatsinkError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for chatsink backend adapters.
///
/// Provides identity and health checks so the binary can report on its
/// collaborators at startup without knowing their concrete types.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the kind of backend this adapter fronts.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, ChatsinkError>;
}
