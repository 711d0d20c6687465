// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion worker: pulls jobs from the queue and drives each through
//! normalization, entity resolution, and message persistence.
//!
//! Each job runs the sequence `Received -> Normalizing -> Resolving ->
//! Persisting -> Done`; any step may move it to `Failed`. How a failure is
//! reported back to the queue depends on its class:
//!
//! - normalization errors, unknown job types, and terminal store rejections
//!   fail the job immediately;
//! - transient errors hand the job back for a delayed retry until its attempt
//!   budget is spent, at which point an alert is logged.
//!
//! Results are settled under the delivery's lease. If the job's visibility
//! lock expired mid-run and another worker took it over, the result is
//! dropped and the new holder's outcome stands.

use std::sync::Arc;
use std::time::Duration;

use chatsink_config::model::ChatsinkConfig;
use chatsink_core::types::{Job, NormalizedMessage, RawEvent, RetryOutcome, Row, PROCESS_MESSAGE_JOB};
use chatsink_core::{ChatsinkError, JobQueue, RowStore};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::normalizer;
use crate::resolver::EntityResolver;
use crate::schema::{self, messages};

/// Reason recorded on jobs whose payload is not a JSON object.
pub const INVALID_PAYLOAD: &str = "invalid_payload";

/// Per-job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Normalizing,
    Resolving,
    Persisting,
    Done,
    Failed,
}

impl JobState {
    /// Legal successor states. `Failed` and `Done` are absorbing.
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Received, Normalizing)
                | (Normalizing, Resolving)
                | (Resolving, Persisting)
                | (Persisting, Done)
                | (Received | Normalizing | Resolving | Persisting, Failed)
        )
    }
}

/// How a processed job left the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Message persisted and job acknowledged. `message_id` is `None` when
    /// the store did not echo the new row's id.
    Completed { message_id: Option<String> },
    /// Job failed terminally; `reason` was recorded on the job.
    Failed { reason: String },
    /// Job handed back for another attempt.
    Retrying { attempts: u32, available_at: String },
    /// Transient failure on the final attempt; job is now failed.
    Exhausted { attempts: u32 },
    /// The visibility lock expired before this run settled the job, and a
    /// later delivery owns it now. Nothing was recorded on the queue.
    Superseded { attempt: u32 },
}

/// Tracks one job through its states, logging every transition.
struct JobRun {
    job_id: i64,
    state: JobState,
}

impl JobRun {
    fn new(job_id: i64) -> Self {
        Self {
            job_id,
            state: JobState::Received,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal job transition {:?} -> {next:?}",
            self.state
        );
        debug!(job_id = self.job_id, from = ?self.state, to = ?next, "job state");
        self.state = next;
    }
}

/// A single queue consumer.
///
/// Cloning is cheap; the queue and store handles are shared.
#[derive(Clone)]
pub struct IngestionWorker {
    id: usize,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn RowStore>,
    resolver: EntityResolver,
    poll_interval: Duration,
}

impl IngestionWorker {
    pub fn new(
        id: usize,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn RowStore>,
        resolver: EntityResolver,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            queue,
            store,
            resolver,
            poll_interval,
        }
    }

    /// Build worker `id` from the `[worker]` and `[store]` sections.
    pub fn from_config(
        id: usize,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn RowStore>,
        config: &ChatsinkConfig,
    ) -> Self {
        let resolver = EntityResolver::new(store.clone(), config.store.max_retries);
        Self::new(
            id,
            queue,
            store,
            resolver,
            Duration::from_millis(config.worker.poll_interval_ms),
        )
    }

    /// Consume jobs until `cancel` fires.
    ///
    /// Cancellation is only observed between jobs; a job in flight always
    /// runs to completion.
    pub async fn run(self, cancel: CancellationToken) {
        info!(worker = self.id, "ingestion worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    error!(worker = self.id, error = %e, "queue operation failed");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!(worker = self.id, "ingestion worker stopped");
    }

    /// Dequeue and handle at most one job.
    ///
    /// Returns `Ok(None)` when the queue is idle. Errors are queue failures
    /// only; job failures are reported through [`JobOutcome`].
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, ChatsinkError> {
        let Some(job) = self.queue.dequeue().await? else {
            return Ok(None);
        };
        self.handle(job).await.map(Some)
    }

    /// Process `job` and record the result on the queue.
    pub async fn handle(&self, job: Job) -> Result<JobOutcome, ChatsinkError> {
        let mut run = JobRun::new(job.id);
        let lease = job.lease();

        match self.process(&job, &mut run).await {
            Ok(message_id) => {
                match self.queue.ack(&lease).await {
                    Ok(()) => {}
                    Err(e) if e.is_lease_lost() => return Ok(self.superseded(&job, &e)),
                    Err(e) => return Err(e),
                }
                run.advance(JobState::Done);
                info!(
                    worker = self.id,
                    job_id = job.id,
                    attempt = job.attempts,
                    message_id = message_id.as_deref().unwrap_or("unknown"),
                    "message ingested"
                );
                Ok(JobOutcome::Completed { message_id })
            }
            Err(e) if e.is_transient() => {
                run.advance(JobState::Failed);
                let retried = match self.queue.retry(&lease, &e.to_string()).await {
                    Ok(outcome) => outcome,
                    Err(lost) if lost.is_lease_lost() => return Ok(self.superseded(&job, &lost)),
                    Err(other) => return Err(other),
                };
                match retried {
                    RetryOutcome::Scheduled {
                        attempts,
                        available_at,
                    } => {
                        warn!(
                            worker = self.id,
                            job_id = job.id,
                            attempt = attempts,
                            max_attempts = job.max_attempts,
                            available_at = %available_at,
                            error = %e,
                            "transient failure, job scheduled for retry"
                        );
                        Ok(JobOutcome::Retrying {
                            attempts,
                            available_at,
                        })
                    }
                    RetryOutcome::Exhausted { attempts } => {
                        error!(
                            alert = true,
                            worker = self.id,
                            job_id = job.id,
                            attempt = attempts,
                            error = %e,
                            payload = %job.payload,
                            "retries exhausted, job failed"
                        );
                        Ok(JobOutcome::Exhausted { attempts })
                    }
                }
            }
            Err(e) => {
                run.advance(JobState::Failed);
                let reason = match &e {
                    ChatsinkError::Normalization(n) => {
                        error!(
                            worker = self.id,
                            job_id = job.id,
                            reason = n.reason(),
                            payload = %job.payload,
                            "payload could not be normalized, job failed"
                        );
                        n.reason().to_string()
                    }
                    ChatsinkError::Internal(reason) if reason == INVALID_PAYLOAD => {
                        error!(
                            worker = self.id,
                            job_id = job.id,
                            payload = %job.payload,
                            "payload is not a JSON object, job failed"
                        );
                        INVALID_PAYLOAD.to_string()
                    }
                    other => {
                        error!(
                            worker = self.id,
                            job_id = job.id,
                            error = %other,
                            "job failed"
                        );
                        other.to_string()
                    }
                };
                match self.queue.fail(&lease, &reason).await {
                    Ok(()) => Ok(JobOutcome::Failed { reason }),
                    Err(lost) if lost.is_lease_lost() => Ok(self.superseded(&job, &lost)),
                    Err(other) => Err(other),
                }
            }
        }
    }

    /// Drop the result of a run whose delivery was taken over.
    fn superseded(&self, job: &Job, error: &ChatsinkError) -> JobOutcome {
        warn!(
            worker = self.id,
            job_id = job.id,
            attempt = job.attempts,
            error = %error,
            "visibility lock lost before the job was settled, result dropped"
        );
        JobOutcome::Superseded {
            attempt: job.attempts,
        }
    }

    /// The per-job pipeline. Returns the id of the persisted message row.
    async fn process(&self, job: &Job, run: &mut JobRun) -> Result<Option<String>, ChatsinkError> {
        if job.job_type != PROCESS_MESSAGE_JOB {
            return Err(ChatsinkError::Internal(format!(
                "unknown job type `{}`",
                job.job_type
            )));
        }

        run.advance(JobState::Normalizing);
        let raw: RawEvent = match serde_json::from_str::<Value>(&job.payload) {
            Ok(Value::Object(raw)) => raw,
            _ => return Err(ChatsinkError::Internal(INVALID_PAYLOAD.into())),
        };
        let message = normalizer::normalize(&raw)?;
        debug!(
            job_id = job.id,
            chat_id = %message.chat_id,
            message_type = %message.message_type,
            "payload normalized"
        );

        run.advance(JobState::Resolving);
        let sender_id = self
            .resolver
            .resolve_sender(
                &message.sender_canonical,
                &message.sender_display_name,
                message.is_outbound,
            )
            .await?;
        let conversation_id = self
            .resolver
            .resolve_conversation(
                &message.chat_id,
                &format!("Chat {}", message.sender_display_name),
                &message.instance_id,
                &sender_id,
                message.is_outbound,
            )
            .await?;

        run.advance(JobState::Persisting);
        let row = message_row(
            &message,
            normalizer::unwrap_envelope(&raw),
            &conversation_id.0,
            &sender_id.0,
        );
        let stored = self.store.insert(messages::TABLE, row).await.map_err(|e| {
            if e.is_transient() {
                e
            } else {
                ChatsinkError::Backend {
                    message: format!("message insert rejected: {e}"),
                }
            }
        })?;

        let message_id = match stored.get(schema::ID) {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        if message_id.is_none() {
            warn!(
                worker = self.id,
                job_id = job.id,
                chat_id = %message.chat_id,
                "store returned the message row without an id"
            );
        }
        Ok(message_id)
    }
}

/// Build the `messages` row for a normalized event.
///
/// `metadata` is the unwrapped event plus a `sender_info` block and the
/// processing timestamp.
pub fn message_row(
    message: &NormalizedMessage,
    event: &RawEvent,
    conversation_id: &str,
    sender_id: &str,
) -> Row {
    let mut metadata = event.clone();
    metadata.insert(
        "sender_info".into(),
        json!({
            "phone": message.sender_address,
            "name": message.sender_display_name,
            "is_from_me": message.is_outbound,
            "clean_phone": message.sender_canonical,
        }),
    );
    metadata.insert(
        "processed_at".into(),
        json!(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
    );

    let mut row = Row::new();
    row.insert(messages::CONTENT.into(), json!(message.content));
    row.insert(messages::MSG_TYPE.into(), json!(message.message_type.to_string()));
    row.insert(
        messages::MSG_STATUS.into(),
        json!(message.delivery_status.to_string()),
    );
    row.insert(
        messages::WHATSAPP_MESSAGE_ID.into(),
        json!(message.external_message_id),
    );
    row.insert(
        messages::EVOLUTION_MESSAGE_ID.into(),
        json!(message.external_message_id),
    );
    row.insert(messages::CONVERSATION_ID.into(), json!(conversation_id));
    row.insert(messages::SENDER_ID.into(), json!(sender_id));
    row.insert(messages::METADATA.into(), Value::Object(metadata));
    row
}
