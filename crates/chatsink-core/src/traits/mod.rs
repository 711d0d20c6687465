// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the pipeline's two shared resources.
//!
//! Both adapters extend [`PluginAdapter`] and use `#[async_trait]` so they can
//! be held as `Arc<dyn ...>` and swapped for test doubles.

pub mod adapter;
pub mod queue;
pub mod store;

pub use adapter::PluginAdapter;
pub use queue::JobQueue;
pub use store::RowStore;
