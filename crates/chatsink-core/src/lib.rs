// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chatsink ingestion pipeline.
//!
//! This crate provides the error taxonomy, the shared data model, and the
//! two adapter traits ([`JobQueue`] and [`RowStore`]) that every other
//! crate in the workspace is written against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ChatsinkError, NormalizationError};
pub use types::{
    AdapterType, ConversationId, DeliveryStatus, HealthStatus, Job, JobStatus, Lease, MessageType,
    NormalizedMessage, RawEvent, Row, UserId,
};

pub use traits::{JobQueue, PluginAdapter, RowStore};
