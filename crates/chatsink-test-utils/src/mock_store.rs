// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory relational store for deterministic testing.
//!
//! `MockStore` implements `RowStore` with per-table unique keys, generated
//! ids, optional per-call latency, and scripted failure injection, so
//! resolver races and outages can be reproduced without a database.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use chatsink_core::traits::adapter::PluginAdapter;
use chatsink_core::traits::store::RowStore;
use chatsink_core::types::{AdapterType, HealthStatus, Row};
use chatsink_core::ChatsinkError;

/// Which store call an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Insert,
}

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Retryable outage (connection reset, 503).
    Transient,
    /// Non-retryable rejection (bad column, permission denied).
    Backend,
}

impl InjectedFailure {
    fn to_error(self, op: StoreOp, table: &str) -> ChatsinkError {
        match self {
            InjectedFailure::Transient => {
                ChatsinkError::transient(format!("injected {op:?} outage on `{table}`"))
            }
            InjectedFailure::Backend => ChatsinkError::Backend {
                message: format!("injected {op:?} rejection on `{table}`"),
            },
        }
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    unique: HashMap<String, Vec<String>>,
    failures: HashMap<(StoreOp, String), VecDeque<InjectedFailure>>,
    calls: HashMap<(StoreOp, String), usize>,
    next_id: u64,
}

/// A mock row store holding tables in memory.
///
/// By default `users.phone` and `conversations.whatsapp_chat_id` are unique,
/// mirroring the production schema. Inserts that collide on a unique column
/// fail with [`ChatsinkError::ConstraintViolation`].
#[derive(Clone)]
pub struct MockStore {
    state: Arc<Mutex<State>>,
    latency: Option<Duration>,
}

impl MockStore {
    /// Create a mock store with the production unique keys.
    pub fn new() -> Self {
        let mut state = State::default();
        state
            .unique
            .insert("users".to_string(), vec!["phone".to_string()]);
        state.unique.insert(
            "conversations".to_string(),
            vec!["whatsapp_chat_id".to_string()],
        );
        Self {
            state: Arc::new(Mutex::new(state)),
            latency: None,
        }
    }

    /// Sleep before every call, widening race windows between tasks.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Declare an additional unique column on `table`.
    pub async fn add_unique(&self, table: &str, column: &str) {
        self.state
            .lock()
            .await
            .unique
            .entry(table.to_string())
            .or_default()
            .push(column.to_string());
    }

    /// Queue `times` failures for the next calls of `op` on `table`.
    pub async fn fail_next(&self, op: StoreOp, table: &str, failure: InjectedFailure, times: usize) {
        let mut state = self.state.lock().await;
        let queue = state.failures.entry((op, table.to_string())).or_default();
        queue.extend(std::iter::repeat_n(failure, times));
    }

    /// Insert a row directly, bypassing uniqueness checks and failure injection.
    pub async fn seed(&self, table: &str, mut row: Row) -> Row {
        let mut state = self.state.lock().await;
        if !row.contains_key("id") {
            state.next_id += 1;
            row.insert("id".into(), Value::String(format!("{table}-{}", state.next_id)));
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Snapshot of all rows in `table`, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of rows in `table`.
    pub async fn count(&self, table: &str) -> usize {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map_or(0, Vec::len)
    }

    /// Number of `op` calls made against `table`, including failed ones.
    pub async fn calls(&self, op: StoreOp, table: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(&(op, table.to_string()))
            .copied()
            .unwrap_or(0)
    }

    async fn enter(&self, op: StoreOp, table: &str) -> Result<(), ChatsinkError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock().await;
        *state.calls.entry((op, table.to_string())).or_default() += 1;
        match state
            .failures
            .get_mut(&(op, table.to_string()))
            .and_then(VecDeque::pop_front)
        {
            Some(failure) => Err(failure.to_error(op, table)),
            None => Ok(()),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockStore {
    fn name(&self) -> &str {
        "mock-store"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatsinkError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RowStore for MockStore {
    async fn select_eq(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, ChatsinkError> {
        self.enter(StoreOp::Select, table).await?;
        let state = self.state.lock().await;
        Ok(state
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row.get(column) == Some(value)))
            .cloned())
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, ChatsinkError> {
        self.enter(StoreOp::Insert, table).await?;
        let mut state = self.state.lock().await;

        let unique_columns = state.unique.get(table).cloned().unwrap_or_default();
        let existing = state.tables.get(table).map(Vec::as_slice).unwrap_or_default();
        for column in &unique_columns {
            let Some(candidate) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            if existing.iter().any(|r| r.get(column) == Some(candidate)) {
                return Err(ChatsinkError::ConstraintViolation {
                    table: table.to_string(),
                    detail: format!("Key ({column})=({candidate}) already exists."),
                });
            }
        }

        state.next_id += 1;
        let id = format!("{table}-{}", state.next_id);
        row.insert("id".into(), Value::String(id));
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }
}
