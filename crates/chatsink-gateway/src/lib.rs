// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP webhook gateway.
//!
//! The gateway only validates and enqueues: a `POST /webhook` is
//! acknowledged once its payload is durable in the queue, and all
//! normalization and store writes happen later in the ingestion workers.

pub mod handlers;
pub mod server;

pub use server::{router, start_server, GatewayState};
