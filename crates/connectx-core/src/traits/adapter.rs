// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle traits for backing adapters.

use async_trait::async_trait;

use crate::error::ConnectxError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, health and shutdown for a backing adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, ConnectxError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), ConnectxError>;
}

/// A persistence backend with an explicit open/close lifecycle.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and runs pending migrations.
    async fn initialize(&self) -> Result<(), ConnectxError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), ConnectxError>;
}
