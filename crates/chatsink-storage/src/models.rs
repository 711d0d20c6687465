// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for queue entities.
//!
//! The canonical types live in `chatsink-core::types` so that the
//! [`JobQueue`](chatsink_core::JobQueue) trait can name them. This module
//! re-exports them for convenience within the storage crate.

pub use chatsink_core::types::{Job, JobStatus, QueueStats, RetryOutcome};
