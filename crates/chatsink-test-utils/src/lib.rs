// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for chatsink integration tests.
//!
//! Provides a mock row store, canned gateway payloads, and test harness
//! infrastructure for fast, deterministic tests without external services.
//!
//! # Components
//!
//! - [`MockStore`] - In-memory `RowStore` with unique keys and failure injection
//! - [`DownQueue`] - `JobQueue` that rejects every write
//! - [`TestHarness`] - Temp SQLite queue plus mock store, wired to a config
//! - [`fixtures`] - Gateway payloads used across suites

pub mod down_queue;
pub mod fixtures;
pub mod harness;
pub mod mock_store;

pub use down_queue::DownQueue;
pub use harness::TestHarness;
pub use mock_store::{InjectedFailure, MockStore, StoreOp};
