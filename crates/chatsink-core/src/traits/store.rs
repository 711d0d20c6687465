// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational store trait used by the resolver and the worker.

use async_trait::async_trait;

use crate::error::ChatsinkError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Row;

/// Minimal untyped access to the relational store.
///
/// Schema enforcement, including uniqueness of natural keys, is the store's
/// responsibility. Implementations must report duplicate-key rejections as
/// [`ChatsinkError::ConstraintViolation`] and retryable failures as
/// [`ChatsinkError::Transient`] so callers can tell races from outages.
#[async_trait]
pub trait RowStore: PluginAdapter {
    /// Returns the first row of `table` whose `column` equals `value`.
    async fn select_eq(
        &self,
        table: &str,
        column: &str,
        value: &serde_json::Value,
    ) -> Result<Option<Row>, ChatsinkError>;

    /// Inserts `row` into `table` and returns the stored row, including its id.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, ChatsinkError>;
}
