// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent find-or-create resolution of users and conversations.
//!
//! The store's unique constraints on `users.phone` and
//! `conversations.whatsapp_chat_id` are the only concurrency control. A
//! resolver that loses an insert race sees a constraint violation, re-reads,
//! and returns the winner's row, so concurrent workers converge on one id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chatsink_core::types::{ConversationId, ParticipantRole, Row, UserId, UserRole};
use chatsink_core::{ChatsinkError, RowStore};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::schema::{self, conversations, participants, users};

/// Domain used for synthesized user emails.
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "whatsapp.placeholder";

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Whether a find-or-create call inserted the row or found an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found,
    Created,
    /// Our insert lost a race; the row another writer created was re-read.
    RaceLost,
}

/// Finds or creates users and conversations by natural key.
#[derive(Clone)]
pub struct EntityResolver {
    store: Arc<dyn RowStore>,
    max_retries: u32,
    retry_delay: Duration,
}

impl EntityResolver {
    /// Creates a resolver that retries transient store errors up to
    /// `max_retries` times per call.
    pub fn new(store: Arc<dyn RowStore>, max_retries: u32) -> Self {
        Self {
            store,
            max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Overrides the base delay between transient retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Resolve the user behind a canonical sender address.
    ///
    /// New users get role `agent` for outbound messages and `customer`
    /// otherwise, plus a placeholder email derived from the address.
    pub async fn resolve_sender(
        &self,
        canonical_address: &str,
        display_name: &str,
        is_outbound: bool,
    ) -> Result<UserId, ChatsinkError> {
        let mut row = Row::new();
        row.insert(users::NAME.into(), json!(display_name));
        row.insert(users::PHONE.into(), json!(canonical_address));
        row.insert(
            users::EMAIL.into(),
            json!(format!("{canonical_address}@{PLACEHOLDER_EMAIL_DOMAIN}")),
        );
        row.insert(
            users::ROLE.into(),
            json!(UserRole::for_direction(is_outbound).to_string()),
        );

        let (id, resolution) = self
            .find_or_create("user", users::TABLE, users::PHONE, canonical_address, row)
            .await?;
        debug!(user_id = %id, ?resolution, "sender resolved");
        Ok(UserId(id))
    }

    /// Resolve the conversation for a gateway chat id.
    ///
    /// A newly created conversation also gets a participant row for its
    /// creator. That insert is best-effort: failures are logged and ignored.
    pub async fn resolve_conversation(
        &self,
        chat_id: &str,
        title: &str,
        instance_id: &str,
        creator: &UserId,
        is_outbound: bool,
    ) -> Result<ConversationId, ChatsinkError> {
        let mut row = Row::new();
        row.insert(conversations::TITLE.into(), json!(title));
        row.insert(conversations::TYPE.into(), json!(conversations::SUPPORT_TYPE));
        row.insert(conversations::WHATSAPP_CHAT_ID.into(), json!(chat_id));
        row.insert(conversations::EVOLUTION_INSTANCE_ID.into(), json!(instance_id));
        row.insert(conversations::CREATED_BY.into(), json!(creator.0));

        let (id, resolution) = self
            .find_or_create(
                "conversation",
                conversations::TABLE,
                conversations::WHATSAPP_CHAT_ID,
                chat_id,
                row,
            )
            .await?;
        let conversation_id = ConversationId(id);

        if resolution == Resolution::Created {
            info!(conversation_id = %conversation_id, chat_id, "conversation created");
            self.add_participant(&conversation_id, creator, is_outbound)
                .await;
        }
        Ok(conversation_id)
    }

    async fn add_participant(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
        is_outbound: bool,
    ) {
        let mut row = Row::new();
        row.insert(participants::CONVERSATION_ID.into(), json!(conversation_id.0));
        row.insert(participants::USER_ID.into(), json!(user_id.0));
        row.insert(
            participants::ROLE.into(),
            json!(ParticipantRole::for_direction(is_outbound).to_string()),
        );

        let result = self
            .with_retry("insert participant", || {
                self.store.insert(participants::TABLE, row.clone())
            })
            .await;
        match result {
            Ok(_) => debug!(conversation_id = %conversation_id, user_id = %user_id, "participant added"),
            Err(e) if e.is_constraint_violation() => {
                debug!(conversation_id = %conversation_id, "participant already present")
            }
            Err(e) => warn!(
                conversation_id = %conversation_id,
                user_id = %user_id,
                error = %e,
                "failed to add conversation participant, continuing"
            ),
        }
    }

    /// Select by natural key; on miss insert; on a uniqueness violation
    /// re-read and return the existing row.
    async fn find_or_create(
        &self,
        entity: &'static str,
        table: &str,
        key_column: &str,
        key: &str,
        row: Row,
    ) -> Result<(String, Resolution), ChatsinkError> {
        let key_value = Value::String(key.to_string());
        let wrap = |e: ChatsinkError| into_resolution_error(entity, key, e);

        let lookup = || self.store.select_eq(table, key_column, &key_value);

        if let Some(existing) = self.with_retry("select", lookup).await.map_err(wrap)? {
            return Ok((row_id(entity, key, &existing)?, Resolution::Found));
        }

        match self
            .with_retry("insert", || self.store.insert(table, row.clone()))
            .await
        {
            Ok(created) => Ok((row_id(entity, key, &created)?, Resolution::Created)),
            Err(e) if e.is_constraint_violation() => {
                debug!(table, key, "insert lost race, re-reading");
                match self.with_retry("select", lookup).await.map_err(wrap)? {
                    Some(winner) => Ok((row_id(entity, key, &winner)?, Resolution::RaceLost)),
                    None => Err(ChatsinkError::Resolution {
                        entity,
                        key: key.to_string(),
                        message: "uniqueness violation but no row found on re-read".into(),
                    }),
                }
            }
            Err(e) => Err(wrap(e)),
        }
    }

    /// Runs `op`, retrying transient failures up to `max_retries` times.
    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, ChatsinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChatsinkError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(op, attempt, error = %e, "transient store error, will retry");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                other => return other,
            }
        }
    }
}

/// Transient errors pass through for the queue to retry; constraint
/// violations are handled by the caller; everything else is terminal.
fn into_resolution_error(entity: &'static str, key: &str, e: ChatsinkError) -> ChatsinkError {
    match e {
        ChatsinkError::Transient { .. } | ChatsinkError::Timeout { .. } => e,
        ChatsinkError::Resolution { .. } => e,
        other => ChatsinkError::Resolution {
            entity,
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

fn row_id(entity: &'static str, key: &str, row: &Row) -> Result<String, ChatsinkError> {
    match row.get(schema::ID) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(ChatsinkError::Resolution {
            entity,
            key: key.to_string(),
            message: "store returned a row without an id".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use async_trait::async_trait;
    use chatsink_core::types::{AdapterType, HealthStatus};
    use chatsink_core::PluginAdapter;
    use chatsink_test_utils::{InjectedFailure, MockStore, StoreOp};

    fn resolver(store: &MockStore, max_retries: u32) -> EntityResolver {
        EntityResolver::new(Arc::new(store.clone()), max_retries).with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn sender_is_created_once_then_found() {
        let store = MockStore::new();
        let resolver = resolver(&store, 2);

        let first = resolver
            .resolve_sender("551199999999", "Ana", false)
            .await
            .unwrap();
        let second = resolver
            .resolve_sender("551199999999", "Ana", false)
            .await
            .unwrap();
        assert_eq!(first, second);

        let users = store.rows("users").await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["phone"], "551199999999");
        assert_eq!(users[0]["name"], "Ana");
        assert_eq!(users[0]["role"], "customer");
        assert_eq!(users[0]["email"], "551199999999@whatsapp.placeholder");
    }

    #[tokio::test]
    async fn outbound_sender_is_agent() {
        let store = MockStore::new();
        resolver(&store, 0)
            .resolve_sender("5511000", "Desk", true)
            .await
            .unwrap();
        assert_eq!(store.rows("users").await[0]["role"], "agent");
    }

    #[tokio::test]
    async fn conversation_creation_adds_participant() {
        let store = MockStore::new();
        let resolver = resolver(&store, 0);
        let user = resolver.resolve_sender("5511", "Ana", false).await.unwrap();

        let conv = resolver
            .resolve_conversation("5511@s.whatsapp.net", "Chat Ana", "inst", &user, false)
            .await
            .unwrap();
        let again = resolver
            .resolve_conversation("5511@s.whatsapp.net", "Chat Ana", "inst", &user, false)
            .await
            .unwrap();
        assert_eq!(conv, again);

        let conversations = store.rows("conversations").await;
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0]["title"], "Chat Ana");
        assert_eq!(conversations[0]["type"], "support");
        assert_eq!(conversations[0]["evolution_instance_id"], "inst");
        assert_eq!(conversations[0]["created_by"], json!(user.0));

        let participants = store.rows("conversation_participants").await;
        assert_eq!(participants.len(), 1, "participant only added on creation");
        assert_eq!(participants[0]["conversation_id"], json!(conv.0));
        assert_eq!(participants[0]["role"], "member");
    }

    #[tokio::test]
    async fn participant_failure_does_not_fail_resolution() {
        let store = MockStore::new();
        store
            .fail_next(
                StoreOp::Insert,
                "conversation_participants",
                InjectedFailure::Backend,
                1,
            )
            .await;
        let resolver = resolver(&store, 0);
        let user = UserId("u-1".into());

        let conv = resolver
            .resolve_conversation("chat", "Chat X", "default", &user, true)
            .await;
        assert!(conv.is_ok());
        assert_eq!(store.count("conversations").await, 1);
        assert_eq!(store.count("conversation_participants").await, 0);
    }

    /// Store whose first insert into `users` loses a race: a competing row
    /// lands just before ours and our insert is rejected.
    struct LosingRaceStore {
        inner: MockStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl PluginAdapter for LosingRaceStore {
        fn name(&self) -> &str {
            "losing-race"
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Store
        }

        async fn health_check(&self) -> Result<HealthStatus, ChatsinkError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl RowStore for LosingRaceStore {
        async fn select_eq(
            &self,
            table: &str,
            column: &str,
            value: &Value,
        ) -> Result<Option<Row>, ChatsinkError> {
            self.inner.select_eq(table, column, value).await
        }

        async fn insert(&self, table: &str, row: Row) -> Result<Row, ChatsinkError> {
            if table == "users" && !self.raced.swap(true, Ordering::SeqCst) {
                let mut winner = row.clone();
                winner.insert("name".into(), json!("Winner"));
                self.inner.seed(table, winner).await;
            }
            self.inner.insert(table, row).await
        }
    }

    #[tokio::test]
    async fn insert_race_is_absorbed_by_re_read() {
        let inner = MockStore::new();
        let store = Arc::new(LosingRaceStore {
            inner: inner.clone(),
            raced: AtomicBool::new(false),
        });
        let resolver = EntityResolver::new(store, 0);

        let id = resolver.resolve_sender("5511", "Loser", false).await.unwrap();

        let users = inner.rows("users").await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["name"], "Winner");
        assert_eq!(json!(id.0), users[0]["id"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolvers_converge_on_one_row() {
        let store = MockStore::new().with_latency(Duration::from_millis(5));
        let resolver = resolver(&store, 0);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                let user = resolver.resolve_sender("5511", "Ana", false).await.unwrap();
                let conv = resolver
                    .resolve_conversation("5511@s.whatsapp.net", "Chat Ana", "default", &user, false)
                    .await
                    .unwrap();
                (user, conv)
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.count("users").await, 1);
        assert_eq!(store.count("conversations").await, 1);
        assert_eq!(store.count("conversation_participants").await, 1);
        // Every task raced past the initial select.
        assert!(store.calls(StoreOp::Insert, "users").await > 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_within_budget() {
        let store = MockStore::new();
        store
            .fail_next(StoreOp::Select, "users", InjectedFailure::Transient, 2)
            .await;
        let id = resolver(&store, 2)
            .resolve_sender("5511", "Ana", false)
            .await
            .unwrap();
        assert!(!id.0.is_empty());
        assert_eq!(store.calls(StoreOp::Select, "users").await, 3);
    }

    #[tokio::test]
    async fn transient_errors_surface_after_budget() {
        let store = MockStore::new();
        store
            .fail_next(StoreOp::Insert, "users", InjectedFailure::Transient, 3)
            .await;
        let err = resolver(&store, 2)
            .resolve_sender("5511", "Ana", false)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got: {err:?}");
        assert_eq!(store.calls(StoreOp::Insert, "users").await, 3);
        assert_eq!(store.count("users").await, 0);
    }

    #[tokio::test]
    async fn backend_rejection_is_terminal_resolution_error() {
        let store = MockStore::new();
        store
            .fail_next(StoreOp::Insert, "conversations", InjectedFailure::Backend, 1)
            .await;
        let err = resolver(&store, 2)
            .resolve_conversation("chat-1", "Chat", "default", &UserId("u".into()), false)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        match err {
            ChatsinkError::Resolution { entity, key, .. } => {
                assert_eq!(entity, "conversation");
                assert_eq!(key, "chat-1");
            }
            other => panic!("expected Resolution, got {other:?}"),
        }
        assert_eq!(store.calls(StoreOp::Insert, "conversations").await, 1);
    }
}
