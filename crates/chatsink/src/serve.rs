// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatsink serve`, `chatsink gateway`, and `chatsink worker`.
//!
//! All three open the durable queue. The gateway side binds the webhook
//! server; the worker side connects to the row store and spawns
//! `worker.concurrency` ingestion workers sharing the queue.

use std::sync::Arc;

use chatsink_config::model::ChatsinkConfig;
use chatsink_core::{ChatsinkError, HealthStatus, PluginAdapter, RowStore};
use chatsink_gateway::GatewayState;
use chatsink_ingest::{Enqueuer, IngestionWorker};
use chatsink_postgrest::PostgrestStore;
use chatsink_storage::SqliteQueue;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// Which halves of the service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Components {
    All,
    GatewayOnly,
    WorkersOnly,
}

impl Components {
    pub fn runs_gateway(self) -> bool {
        matches!(self, Components::All | Components::GatewayOnly)
    }

    pub fn runs_workers(self) -> bool {
        matches!(self, Components::All | Components::WorkersOnly)
    }
}

/// Run the selected components until SIGINT/SIGTERM.
pub async fn run_serve(config: ChatsinkConfig, components: Components) -> Result<(), ChatsinkError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, ?components, "starting chatsink");

    let cancel = shutdown::install_signal_handler();
    run_until_cancelled(config, components, cancel).await?;

    info!("chatsink shutdown complete");
    Ok(())
}

/// Run the selected components until `cancel` fires.
///
/// Workers finish the job they hold; the gateway stops accepting
/// connections and drains in-flight requests.
pub async fn run_until_cancelled(
    config: ChatsinkConfig,
    components: Components,
    cancel: CancellationToken,
) -> Result<(), ChatsinkError> {
    // Store connectivity is checked before any queue work is taken on.
    let store = if components.runs_workers() {
        Some(connect_store(&config).await?)
    } else {
        None
    };

    let queue = Arc::new(SqliteQueue::open(&config.queue).await?);
    info!(
        queue = queue.queue_name(),
        path = %config.queue.database_path,
        "durable queue opened"
    );

    let mut workers = JoinSet::new();
    if let Some(store) = store {
        for id in 0..config.worker.concurrency {
            let worker = IngestionWorker::from_config(id, queue.clone(), store.clone(), &config);
            workers.spawn(worker.run(cancel.clone()));
        }
        info!(count = config.worker.concurrency, "ingestion workers started");
    }

    let served = if components.runs_gateway() {
        let state = GatewayState {
            enqueuer: Enqueuer::new(queue.clone()),
        };
        let result = chatsink_gateway::start_server(&config.gateway, state, cancel.clone()).await;
        if result.is_err() {
            // Without the gateway there is nothing feeding the queue.
            cancel.cancel();
        }
        result
    } else {
        cancel.cancelled().await;
        Ok(())
    };

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "ingestion worker task panicked");
        }
    }

    match Arc::try_unwrap(queue) {
        Ok(queue) => {
            if let Err(e) = queue.close().await {
                warn!(error = %e, "failed to checkpoint queue database");
            }
        }
        Err(_) => debug!("queue still shared at shutdown, skipping checkpoint"),
    }

    served
}

async fn connect_store(config: &ChatsinkConfig) -> Result<Arc<dyn RowStore>, ChatsinkError> {
    let store = PostgrestStore::from_config(&config.store)?;
    match store.health_check().await? {
        HealthStatus::Healthy => info!("row store reachable"),
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            // Transient store outages are absorbed by job retries.
            warn!(%reason, "row store health check failed, starting anyway");
        }
    }
    Ok(Arc::new(store))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatsink={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
