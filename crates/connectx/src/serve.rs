// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `connectx serve` command implementation.
//!
//! Opens SQLite storage, wires it in as every collaborator of the gateway and
//! serves until SIGINT/SIGTERM, then checkpoints the WAL.

use std::sync::Arc;

use tracing::{info, warn};

use connectx_config::ConnectxConfig;
use connectx_core::{ConnectxError, StorageAdapter};
use connectx_gateway::{Collaborators, GatewayState};
use connectx_storage::SqliteStorage;

use crate::shutdown::install_signal_handler;

/// Runs the `connectx serve` command.
pub async fn run_serve(config: ConnectxConfig) -> Result<(), ConnectxError> {
    init_tracing(&config.server.log_level);

    info!(
        host = %config.server.host,
        port = config.server.port,
        database = %config.storage.database_path,
        "starting connectx serve"
    );

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let shutdown = install_signal_handler();
    let state = GatewayState::new(Collaborators::from_backend(storage.clone()), &config.chat)
        .with_health_probe(storage.clone())
        .with_shutdown(shutdown);

    let listener = connectx_gateway::bind(&config.server.host, config.server.port).await?;
    let result = connectx_gateway::serve(listener, state).await;

    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }
    info!("connectx serve stopped");
    result
}

/// Log to stderr. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("connectx={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
