// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chatsink ingestion pipeline.
//!
//! Webhook payloads enter through the [`Enqueuer`], wait in the durable queue,
//! and are processed by [`IngestionWorker`]s: each job is normalized, its
//! sender and conversation resolved to store rows, and the message persisted.

pub mod intake;
pub mod normalizer;
pub mod resolver;
pub mod schema;
pub mod worker;

pub use intake::{Enqueuer, IntakeError};
pub use normalizer::normalize;
pub use resolver::{EntityResolver, Resolution};
pub use worker::{IngestionWorker, JobOutcome, JobState};
