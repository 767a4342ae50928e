// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local administration commands: users, connections and config.
//!
//! These stand in for the profile and connection-request services the chat
//! core treats as external. They talk to the SQLite database directly.

use colored::Colorize;

use connectx_config::ConnectxConfig;
use connectx_core::{ConnectxError, StorageAdapter, UserId, UserSummary};
use connectx_storage::SqliteStorage;

async fn open_storage(config: &ConnectxConfig) -> Result<SqliteStorage, ConnectxError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(storage)
}

/// Register (or update) a user. Returns the token now valid for them.
pub async fn add_user(
    config: &ConnectxConfig,
    id: &str,
    name: &str,
    username: Option<&str>,
    token: Option<&str>,
) -> Result<String, ConnectxError> {
    let token = match token {
        Some(token) => token.to_string(),
        None => format!("cx-{}", uuid::Uuid::new_v4().simple()),
    };
    let user = UserSummary {
        id: UserId::from(id),
        name: name.to_string(),
        username: username.unwrap_or(id).to_string(),
        profile_picture: None,
    };

    let storage = open_storage(config).await?;
    storage.add_user(&user, Some(&token)).await?;
    storage.close().await?;
    Ok(token)
}

pub async fn list_users(config: &ConnectxConfig) -> Result<(), ConnectxError> {
    let storage = open_storage(config).await?;
    let users = storage.list_users().await?;
    storage.close().await?;

    if users.is_empty() {
        println!("{}", "no users registered".dimmed());
    }
    for user in users {
        println!("{}  {} (@{})", user.id.as_str().bold(), user.name, user.username);
    }
    Ok(())
}

/// Create an accepted connection between `a` and `b`.
pub async fn connect(config: &ConnectxConfig, a: &str, b: &str) -> Result<(), ConnectxError> {
    let storage = open_storage(config).await?;
    let edge = storage.connect_users(&a.into(), &b.into()).await?;
    storage.close().await?;
    println!("{} {a} <-> {b} ({edge})", "connected".green());
    Ok(())
}

pub fn print_config(config: &ConnectxConfig) -> Result<(), ConnectxError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| ConnectxError::Internal(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}
