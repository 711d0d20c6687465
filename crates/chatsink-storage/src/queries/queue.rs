// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe job processing.
//!
//! Timestamps are ISO-8601 strings produced by SQLite's `strftime`, so they
//! compare correctly as text.

use std::str::FromStr;
use std::time::Duration;

use chatsink_core::types::{Job, JobStatus, Lease, QueueStats, RetryOutcome};
use chatsink_core::ChatsinkError;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::error;

use crate::database::Database;

const JOB_COLUMNS: &str = "id, queue_name, job_type, payload, status, attempts, max_attempts,
     last_error, created_at, updated_at, available_at, locked_until";

/// `last_error` recorded when a job's lock runs out on its last delivery.
const LOCK_EXPIRED_ON_FINAL_ATTEMPT: &str = "visibility timeout expired on final attempt";

/// Exponential retry delay: `min(base * 2^(attempts - 1), max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    /// Delay before the next delivery after `attempts` deliveries have failed.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// SQLite datetime modifier for a positive offset.
fn offset_modifier(delay: Duration) -> String {
    format!("+{:.3} seconds", delay.as_secs_f64())
}

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<Job, rusqlite::Error> {
    let status: String = row.get(4)?;
    let status = JobStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Job {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        job_type: row.get(2)?,
        payload: row.get(3)?,
        status,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        last_error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        available_at: row.get(10)?,
        locked_until: row.get(11)?,
    })
}

/// Enqueue a new job. Returns the auto-generated job ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    job_type: &str,
    payload: &str,
    max_attempts: u32,
) -> Result<i64, ChatsinkError> {
    let queue_name = queue_name.to_string();
    let job_type = job_type.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO queue (queue_name, job_type, payload, max_attempts)
                 VALUES (?1, ?2, ?3, ?4)",
                params![queue_name, job_type, payload, max_attempts],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next deliverable job from the named queue.
///
/// A job is deliverable when it is pending and its `available_at` has passed,
/// or when it is processing but its visibility lock has expired (the worker
/// holding it died or overran the lock). Delivery increments `attempts` and
/// locks the job for `visibility`. An expired job whose budget is already
/// spent is marked failed, with an alert, instead of being delivered again.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    visibility: Duration,
) -> Result<Option<Job>, ChatsinkError> {
    let queue_name = queue_name.to_string();
    let lock_modifier = offset_modifier(visibility);
    let (delivered, expired) = db
        .connection()
        .call(move |conn| -> Result<(Option<Job>, Vec<Job>), rusqlite::Error> {
            // IMMEDIATE so that a second process cannot select the same row
            // between our SELECT and UPDATE.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut expired = Vec::new();

            let delivered = loop {
                let candidate = tx
                    .query_row(
                        &format!(
                            "SELECT {JOB_COLUMNS} FROM queue
                             WHERE queue_name = ?1 AND (
                                 (status = 'pending'
                                  AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                              OR (status = 'processing'
                                  AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                             )
                             ORDER BY id ASC
                             LIMIT 1"
                        ),
                        params![queue_name],
                        row_to_job,
                    )
                    .optional()?;

                let Some(job) = candidate else {
                    break None;
                };

                if job.status == JobStatus::Processing && job.attempts >= job.max_attempts {
                    tx.execute(
                        "UPDATE queue SET status = 'failed', locked_until = NULL,
                         last_error = COALESCE(last_error, ?2),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![job.id, LOCK_EXPIRED_ON_FINAL_ATTEMPT],
                    )?;
                    expired.push(job);
                    continue;
                }

                tx.execute(
                    "UPDATE queue SET status = 'processing', attempts = attempts + 1,
                     locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![job.id, lock_modifier],
                )?;
                break Some(tx.query_row(
                    &format!("SELECT {JOB_COLUMNS} FROM queue WHERE id = ?1"),
                    params![job.id],
                    row_to_job,
                )?);
            };

            tx.commit()?;
            Ok((delivered, expired))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    for job in &expired {
        error!(
            alert = true,
            job_id = job.id,
            attempts = job.attempts,
            locked_until = job.locked_until.as_deref().unwrap_or_default(),
            payload = %job.payload,
            "visibility timeout expired on final attempt, job failed"
        );
    }

    Ok(delivered)
}

/// Guard shared by every settling update: the row is still held by the
/// delivery that `?1`/`?2`/`?3` describe.
const HELD_BY_LEASE: &str =
    "id = ?1 AND status = 'processing' AND attempts = ?2 AND locked_until = ?3";

fn lease_lost(lease: &Lease) -> ChatsinkError {
    ChatsinkError::LeaseLost {
        job_id: lease.job_id,
    }
}

/// Acknowledge successful processing of a job.
///
/// Marks the job as "completed" and releases its lock. Fails with
/// [`ChatsinkError::LeaseLost`] when `lease` is no longer current.
pub async fn ack(db: &Database, lease: &Lease) -> Result<(), ChatsinkError> {
    let held = lease.clone();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE queue SET status = 'completed', locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE {HELD_BY_LEASE}"
                ),
                params![held.job_id, held.attempt, held.locked_until],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Err(lease_lost(lease));
    }
    Ok(())
}

/// Return a job to the queue after a transient failure.
///
/// If the job has used its attempt budget it is marked "failed" and
/// [`RetryOutcome::Exhausted`] is returned. Otherwise it goes back to
/// "pending" and becomes visible after the backoff delay. A stale `lease`
/// leaves the job untouched and fails with [`ChatsinkError::LeaseLost`].
pub async fn retry(
    db: &Database,
    lease: &Lease,
    error: &str,
    backoff: Backoff,
) -> Result<RetryOutcome, ChatsinkError> {
    let held = lease.clone();
    let error = error.to_string();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Option<RetryOutcome>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let max_attempts: Option<u32> = tx
                .query_row(
                    &format!("SELECT max_attempts FROM queue WHERE {HELD_BY_LEASE}"),
                    params![held.job_id, held.attempt, held.locked_until],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(max_attempts) = max_attempts else {
                return Ok(None);
            };
            let attempts = held.attempt;

            let outcome = if attempts >= max_attempts {
                tx.execute(
                    "UPDATE queue SET status = 'failed', last_error = ?2, locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![held.job_id, error],
                )?;
                RetryOutcome::Exhausted { attempts }
            } else {
                let modifier = offset_modifier(backoff.delay_for(attempts));
                let available_at: String = tx.query_row(
                    "UPDATE queue SET status = 'pending', last_error = ?2, locked_until = NULL,
                     available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1
                     RETURNING available_at",
                    params![held.job_id, error, modifier],
                    |row| row.get(0),
                )?;
                RetryOutcome::Scheduled {
                    attempts,
                    available_at,
                }
            };

            tx.commit()?;
            Ok(Some(outcome))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    outcome.ok_or_else(|| lease_lost(lease))
}

/// Mark a job as permanently failed, recording the reason.
///
/// Fails with [`ChatsinkError::LeaseLost`] when `lease` is no longer current.
pub async fn fail(db: &Database, lease: &Lease, error: &str) -> Result<(), ChatsinkError> {
    let held = lease.clone();
    let error = error.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE queue SET status = 'failed', last_error = ?4, locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE {HELD_BY_LEASE}"
                ),
                params![held.job_id, held.attempt, held.locked_until, error],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Err(lease_lost(lease));
    }
    Ok(())
}

/// Fetch a single job by ID.
pub async fn get(db: &Database, id: i64) -> Result<Option<Job>, ChatsinkError> {
    db.connection()
        .call(move |conn| -> Result<Option<Job>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM queue WHERE id = ?1"),
                params![id],
                row_to_job,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List jobs in the named queue, newest first, optionally filtered by status.
pub async fn list(
    db: &Database,
    queue_name: &str,
    status: Option<JobStatus>,
    limit: u32,
) -> Result<Vec<Job>, ChatsinkError> {
    let queue_name = queue_name.to_string();
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Job>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM queue
                 WHERE queue_name = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY id DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![queue_name, status, limit], row_to_job)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move a failed job back to "pending" with a fresh attempt budget.
///
/// Returns `false` when the job does not exist or is not failed.
pub async fn replay(db: &Database, id: i64) -> Result<bool, ChatsinkError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE queue SET status = 'pending', attempts = 0, locked_until = NULL,
                 available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'failed'",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count jobs per status in the named queue.
pub async fn stats(db: &Database, queue_name: &str) -> Result<QueueStats, ChatsinkError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| -> Result<QueueStats, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM queue WHERE queue_name = ?1 GROUP BY status",
            )?;
            let mut rows = stmt.query(params![queue_name])?;
            let mut stats = QueueStats::default();
            while let Some(row) = rows.next()? {
                let status: String = row.get(0)?;
                let count: u64 = row.get(1)?;
                match status.as_str() {
                    "pending" => stats.pending = count,
                    "processing" => stats.processing = count,
                    "completed" => stats.completed = count,
                    "failed" => stats.failed = count,
                    _ => {}
                }
            }
            Ok(stats)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    const VISIBILITY: Duration = Duration::from_secs(300);
    const NO_DELAY: Backoff = Backoff {
        base: Duration::ZERO,
        max: Duration::ZERO,
    };

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = Backoff {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(5000),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(4000));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(5000));
        assert_eq!(backoff.delay_for(200), Duration::from_millis(5000));
    }

    #[test]
    fn offset_modifier_uses_fractional_seconds() {
        assert_eq!(offset_modifier(Duration::from_millis(1500)), "+1.500 seconds");
        assert_eq!(offset_modifier(Duration::ZERO), "+0.000 seconds");
    }

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "inbound", "process-message", r#"{"msg":"hello"}"#, 3)
            .await
            .unwrap();
        assert!(id > 0);

        let job = dequeue(&db, "inbound", VISIBILITY).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.queue_name, "inbound");
        assert_eq!(job.job_type, "process-message");
        assert_eq!(job.payload, r#"{"msg":"hello"}"#);
        assert_eq!(job.attempts, 1);
        assert!(job.locked_until.is_some());

        // Locked job is invisible to other consumers.
        assert!(dequeue(&db, "inbound", VISIBILITY).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_respects_queue_name_and_fifo_order() {
        let (db, _dir) = setup_db().await;

        let first = enqueue(&db, "a", "t", "1", 3).await.unwrap();
        let _other = enqueue(&db, "b", "t", "2", 3).await.unwrap();
        let second = enqueue(&db, "a", "t", "3", 3).await.unwrap();

        assert_eq!(dequeue(&db, "a", VISIBILITY).await.unwrap().unwrap().id, first);
        assert_eq!(dequeue(&db, "a", VISIBILITY).await.unwrap().unwrap().id, second);
        assert!(dequeue(&db, "a", VISIBILITY).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ack_marks_completed() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", "payload", 3).await.unwrap();
        let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
        ack(&db, &job.lease()).await.unwrap();

        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.locked_until.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retry_schedules_until_budget_is_spent() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", "payload", 3).await.unwrap();

        for expected in 1..3 {
            let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
            assert_eq!(job.attempts, expected);
            let outcome = retry(&db, &job.lease(), "store unavailable", NO_DELAY)
                .await
                .unwrap();
            assert!(
                matches!(outcome, RetryOutcome::Scheduled { attempts, .. } if attempts == expected)
            );
        }

        let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
        let outcome = retry(&db, &job.lease(), "store unavailable", NO_DELAY)
            .await
            .unwrap();
        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });

        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("store unavailable"));
        assert!(dequeue(&db, "test", VISIBILITY).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retry_backoff_hides_job_until_available() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", "payload", 3).await.unwrap();
        let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();

        let backoff = Backoff {
            base: Duration::from_secs(60),
            max: Duration::from_secs(600),
        };
        let outcome = retry(&db, &job.lease(), "timeout", backoff).await.unwrap();
        assert!(matches!(outcome, RetryOutcome::Scheduled { attempts: 1, .. }));

        assert!(dequeue(&db, "test", VISIBILITY).await.unwrap().is_none());
        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.available_at > job.updated_at);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_is_terminal() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", "{}", 3).await.unwrap();
        let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
        fail(&db, &job.lease(), "missing_identifiers").await.unwrap();

        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("missing_identifiers"));
        assert!(dequeue(&db, "test", VISIBILITY).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_is_redelivered() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", "payload", 3).await.unwrap();
        let first = dequeue(&db, "test", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.attempts, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let again = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
        assert_eq!(again.id, id);
        assert_eq!(again.attempts, 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn expired_lock_on_final_attempt_fails_job_with_alert() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", r#"{"pushName":"Ana"}"#, 1)
            .await
            .unwrap();
        let _job = dequeue(&db, "test", Duration::ZERO).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(dequeue(&db, "test", VISIBILITY).await.unwrap().is_none());
        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.last_error.as_deref(),
            Some(LOCK_EXPIRED_ON_FINAL_ATTEMPT)
        );

        assert!(logs_contain("alert=true"));
        assert!(logs_contain("visibility timeout expired on final attempt, job failed"));
        assert!(logs_contain("pushName"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_lease_cannot_settle_a_redelivered_job() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", "payload", 5).await.unwrap();
        let first = dequeue(&db, "test", Duration::ZERO).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        // The lock expired; a second consumer now holds the job.
        let second = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
        assert_eq!(second.id, id);
        assert_eq!(second.attempts, 2);

        let stale = first.lease();
        let err = retry(&db, &stale, "late", NO_DELAY).await.unwrap_err();
        assert!(matches!(err, ChatsinkError::LeaseLost { job_id } if job_id == id));
        assert!(ack(&db, &stale).await.unwrap_err().is_lease_lost());
        assert!(fail(&db, &stale, "late").await.unwrap_err().is_lease_lost());

        // The job is still held by the second delivery, invisible to others.
        let held = get(&db, id).await.unwrap().unwrap();
        assert_eq!(held.status, JobStatus::Processing);
        assert_eq!(held.attempts, 2);
        assert_eq!(held.locked_until, second.locked_until);
        assert!(dequeue(&db, "test", VISIBILITY).await.unwrap().is_none());

        // The current holder settles normally.
        ack(&db, &second.lease()).await.unwrap();
        assert_eq!(
            get(&db, id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn settled_job_rejects_a_second_settlement() {
        let (db, _dir) = setup_db().await;

        enqueue(&db, "test", "t", "payload", 3).await.unwrap();
        let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
        ack(&db, &job.lease()).await.unwrap();

        assert!(fail(&db, &job.lease(), "late").await.unwrap_err().is_lease_lost());
        assert_eq!(
            get(&db, job.id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn replay_resets_failed_job() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "t", "payload", 3).await.unwrap();
        let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();

        // Only failed jobs can be replayed.
        assert!(!replay(&db, id).await.unwrap());

        fail(&db, &job.lease(), "boom").await.unwrap();
        assert!(replay(&db, id).await.unwrap());
        assert!(!replay(&db, 9_999).await.unwrap());

        let job = dequeue(&db, "test", VISIBILITY).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.attempts, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_and_stats_reflect_statuses() {
        let (db, _dir) = setup_db().await;

        let done = enqueue(&db, "q", "t", "1", 3).await.unwrap();
        let broken = enqueue(&db, "q", "t", "2", 3).await.unwrap();
        let _waiting = enqueue(&db, "q", "t", "3", 3).await.unwrap();
        enqueue(&db, "other", "t", "4", 3).await.unwrap();

        let job = dequeue(&db, "q", VISIBILITY).await.unwrap().unwrap();
        assert_eq!(job.id, done);
        ack(&db, &job.lease()).await.unwrap();
        let job = dequeue(&db, "q", VISIBILITY).await.unwrap().unwrap();
        assert_eq!(job.id, broken);
        fail(&db, &job.lease(), "bad").await.unwrap();

        let stats = stats(&db, "q").await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                pending: 1,
                processing: 0,
                completed: 1,
                failed: 1,
            }
        );

        let all = list(&db, "q", None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].id > all[2].id, "newest first");

        let failed = list(&db, "q", Some(JobStatus::Failed), 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, broken);

        assert_eq!(list(&db, "q", None, 2).await.unwrap().len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_consumers_never_share_a_job() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("concurrent_test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        for i in 0..20 {
            enqueue(&db, "q", "t", &format!(r#"{{"n":{i}}}"#), 3)
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(job) = dequeue(&db, "q", VISIBILITY).await.unwrap() {
                    seen.push(job.id);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(all.len(), 20);
        assert_eq!(unique.len(), 20);

        db.close().await.unwrap();
    }
}
