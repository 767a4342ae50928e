// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage and collaborator traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use connectx_config::model::StorageConfig;
use connectx_core::types::{ChatMessage, ConnectionEdge, UserId, UserSummary};
use connectx_core::{
    AdapterType, ConnectionsGraph, ConnectxError, HealthStatus, IdentityValidator, MessageStore,
    PluginAdapter, StorageAdapter, UserDirectory,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other call
/// fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create an adapter around an already opened database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// The open database, or an error if [`initialize`](StorageAdapter::initialize)
    /// has not run.
    pub fn database(&self) -> Result<&Database, ConnectxError> {
        self.db.get().ok_or_else(|| {
            ConnectxError::storage("storage not initialized: call initialize() first")
        })
    }

    /// Register or update a user, optionally (re)issuing their session token.
    pub async fn add_user(
        &self,
        user: &UserSummary,
        token: Option<&str>,
    ) -> Result<(), ConnectxError> {
        queries::users::upsert_user(self.database()?, user, token).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ConnectxError> {
        queries::users::list_users(self.database()?).await
    }

    /// Record a pending request from `from` to `to`; returns the edge id.
    pub async fn request_connection(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<String, ConnectxError> {
        queries::connections::request_connection(self.database()?, from, to).await
    }

    pub async fn accept_connection(&self, edge_id: &str) -> Result<bool, ConnectxError> {
        queries::connections::accept_connection(self.database()?, edge_id).await
    }

    /// Create (or accept) the edge between `a` and `b` in one step.
    pub async fn connect_users(&self, a: &UserId, b: &UserId) -> Result<String, ConnectxError> {
        queries::connections::connect_users(self.database()?, a, b).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ConnectxError> {
        let Ok(db) = self.database() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let probe = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err);
        match probe {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => {
                warn!(error = %e, "sqlite health probe failed");
                Ok(HealthStatus::Degraded(e.to_string()))
            }
        }
    }

    async fn shutdown(&self) -> Result<(), ConnectxError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ConnectxError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ConnectxError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectxError> {
        self.database()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl IdentityValidator for SqliteStorage {
    async fn authenticate(&self, token: &str) -> Result<UserSummary, ConnectxError> {
        queries::users::find_by_token(self.database()?, token)
            .await?
            .ok_or_else(|| ConnectxError::Auth("invalid session token".into()))
    }
}

#[async_trait]
impl UserDirectory for SqliteStorage {
    async fn get_user(&self, id: &UserId) -> Result<Option<UserSummary>, ConnectxError> {
        queries::users::get_user(self.database()?, id).await
    }
}

#[async_trait]
impl ConnectionsGraph for SqliteStorage {
    async fn accepted_connections(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConnectionEdge>, ConnectxError> {
        queries::connections::accepted_connections(self.database()?, user).await
    }

    async fn are_connected(&self, a: &UserId, b: &UserId) -> Result<bool, ConnectxError> {
        let status = queries::connections::connection_status(self.database()?, a, b).await?;
        Ok(status == Some(crate::ConnectionStatus::Accepted))
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), ConnectxError> {
        queries::messages::insert_message(self.database()?, message).await
    }

    async fn history(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>, ConnectxError> {
        queries::messages::conversation_history(self.database()?, a, b).await
    }

    async fn last_message(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<ChatMessage>, ConnectxError> {
        queries::messages::last_message(self.database()?, a, b).await
    }

    async fn unread_count(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError> {
        queries::messages::unread_count(self.database()?, receiver, sender).await
    }

    async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> Result<u64, ConnectxError> {
        queries::messages::mark_read(self.database()?, receiver, sender).await
    }

    async fn mark_read_until(
        &self,
        receiver: &UserId,
        sender: &UserId,
        until: &str,
    ) -> Result<u64, ConnectxError> {
        queries::messages::mark_read_until(self.database()?, receiver, sender, until).await
    }
}
