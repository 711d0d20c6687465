// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PostgREST row store adapter for chatsink.
//!
//! Implements [`RowStore`](chatsink_core::RowStore) over the PostgREST HTTP
//! interface using an elevated-privilege service key, so the pipeline can
//! create users and conversations regardless of row-level security.

pub mod client;
pub mod error;

pub use client::PostgrestStore;
