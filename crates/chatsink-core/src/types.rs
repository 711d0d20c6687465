// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the intake, queue, resolver, and worker.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// An inbound gateway event exactly as delivered. Untrusted.
pub type RawEvent = serde_json::Map<String, serde_json::Value>;

/// An untyped relational row as exchanged with a [`RowStore`](crate::RowStore).
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Job-type tag the worker dispatches on.
pub const PROCESS_MESSAGE_JOB: &str = "process-message";

/// Identifier of a persisted user row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier of a persisted conversation row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical message classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    File,
    Location,
    Contact,
    System,
}

/// Canonical delivery status of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Role assigned to a user on first sight.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Customer,
    Agent,
}

impl UserRole {
    /// Outbound messages come from the bot/agent side.
    pub fn for_direction(is_outbound: bool) -> Self {
        if is_outbound {
            UserRole::Agent
        } else {
            UserRole::Customer
        }
    }
}

/// Role of a user inside a conversation's participant set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParticipantRole {
    Admin,
    Member,
}

impl ParticipantRole {
    pub fn for_direction(is_outbound: bool) -> Self {
        if is_outbound {
            ParticipantRole::Admin
        } else {
            ParticipantRole::Member
        }
    }
}

/// Canonical, fully typed projection of a [`RawEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Stable per-conversation key assigned by the gateway.
    pub chat_id: String,
    /// Sender address in gateway-native form, as stored.
    pub sender_address: String,
    /// Sender address with gateway suffix noise stripped, used for lookups.
    pub sender_canonical: String,
    /// Push/notify name, or the `"unknown"` sentinel.
    pub sender_display_name: String,
    /// True when the message originated from the bot/agent side.
    pub is_outbound: bool,
    /// Gateway instance that delivered the event, or the `"default"` sentinel.
    pub instance_id: String,
    pub message_type: MessageType,
    /// Text content, a caption, a synthesized description, or a placeholder.
    pub content: String,
    /// Gateway message identifier. Kept for downstream duplicate detection.
    pub external_message_id: Option<String>,
    pub delivery_status: DeliveryStatus,
}

/// Lifecycle state of a queued job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A job held by the durable queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: i64,
    pub queue_name: String,
    /// Dispatch tag, e.g. [`PROCESS_MESSAGE_JOB`].
    pub job_type: String,
    /// The raw payload, verbatim.
    pub payload: String,
    pub status: JobStatus,
    /// Number of deliveries so far, including the current one.
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Earliest time the job may be delivered again.
    pub available_at: String,
    /// Visibility lock; a processing job past this instant is redelivered.
    pub locked_until: Option<String>,
}

impl Job {
    /// The lease this delivery holds on the job.
    ///
    /// A job that was not obtained from `dequeue` has no lock, and its lease
    /// never matches.
    pub fn lease(&self) -> Lease {
        Lease {
            job_id: self.id,
            attempt: self.attempts,
            locked_until: self.locked_until.clone().unwrap_or_default(),
        }
    }
}

/// Proof that a consumer holds one delivery of a job.
///
/// Every delivery bumps the attempt count and sets a fresh lock, so a lease
/// goes stale as soon as the job's lock expires and another consumer takes
/// it. Settling a job (`ack`, `retry`, `fail`) requires a current lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub job_id: i64,
    pub attempt: u32,
    pub locked_until: String,
}

/// What happened to a job handed back to the queue after a transient failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The job is pending again and becomes visible at `available_at`.
    Scheduled { attempts: u32, available_at: String },
    /// The attempt budget is spent; the job is now failed.
    Exhausted { attempts: u32 },
}

/// Job counts per status for one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Response returned to the gateway once a payload is safely enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResult {
    pub status: String,
}

impl AckResult {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of backend an adapter fronts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Queue,
    Store,
}
